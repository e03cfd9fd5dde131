// escape.rs: escape literal layout text while keeping directive spans verbatim
use std::ops::Range;

/// Sort spans and coalesce the ones that overlap. Touching spans stay separate
/// so that back-to-back directives (`%h%l`) remain distinct.
pub fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.retain(|s| s.start < s.end);
    spans.sort_by_key(|s| (s.start, s.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start < last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Result of [`escape_outside`]: the escaped text and the positions the
/// preserved spans ended up at inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escaped {
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Regex-escape every part of `layout` outside `preserve`, copying the preserved
/// spans unchanged. `preserve` must be sorted, non-overlapping and lie on char
/// boundaries (the output of [`merge_spans`] over directive positions is).
pub fn escape_outside(layout: &str, preserve: &[Range<usize>]) -> Escaped {
    let mut text = String::with_capacity(layout.len() * 2);
    let mut spans = Vec::with_capacity(preserve.len());
    let mut cursor = 0usize;
    for span in preserve {
        text.push_str(&regex::escape(&layout[cursor..span.start]));
        let start = text.len();
        text.push_str(&layout[span.clone()]);
        spans.push(start..text.len());
        cursor = span.end;
    }
    text.push_str(&regex::escape(&layout[cursor..]));
    Escaped { text, spans }
}

#[cfg(test)]
mod tests {
    use super::{escape_outside, merge_spans};

    #[test]
    fn test_merge_spans() {
        assert_eq!(merge_spans(vec![5..8, 0..2, 1..3]), vec![0..3, 5..8]);
        // identical spans (time directive also seen as a generic token) collapse
        assert_eq!(merge_spans(vec![4..10, 4..10]), vec![4..10]);
        // touching spans stay separate
        assert_eq!(merge_spans(vec![2..4, 0..2]), vec![0..2, 2..4]);
        assert_eq!(merge_spans(vec![3..3]), Vec::<std::ops::Range<usize>>::new());
    }

    #[test]
    fn test_escape_outside_preserves_spans() {
        let layout = r#"[%h] "%r" (%b)."#;
        let preserve = vec![1..3, 6..8, 11..13];
        let escaped = escape_outside(layout, &preserve);
        assert_eq!(escaped.text, r#"\[%h\] "%r" \(%b\)\."#);
        for span in &escaped.spans {
            assert!(escaped.text[span.clone()].starts_with('%'));
        }
        assert_eq!(&escaped.text[escaped.spans[1].clone()], "%r");
    }

    #[test]
    fn test_escape_outside_without_spans() {
        let escaped = escape_outside("a.b*c", &[]);
        assert_eq!(escaped.text, r"a\.b\*c");
        assert!(escaped.spans.is_empty());
    }
}
