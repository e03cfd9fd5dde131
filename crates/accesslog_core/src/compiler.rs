// compiler.rs: translate a directive layout into an anchored named-capture regex
use std::collections::HashSet;
use std::ops::Range;

use crate::directive;
use crate::error::{Error, Result};
use crate::escape::{escape_outside, merge_spans};
use crate::layout::scan;
use crate::timespec;

/// Capture name used for the translated time directive.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Compile `layout` into a regex source string.
///
/// Literal text is escaped and every directive is replaced by its capture
/// fragment. Only the first `%{...}t` is translated as a time directive; any
/// later one is looked up in the directive table like other tokens, where it
/// has no entry. The result is anchored at the start of the line only, so
/// lines with extra trailing fields still match. An empty layout compiles to an
/// empty pattern.
pub fn compile_layout(layout: &str) -> Result<String> {
    let directives = scan(layout);

    let time_idx = directives.iter().position(|d| d.is_time());
    let mut spans: Vec<Range<usize>> = time_idx
        .map(|i| directives[i].range.clone())
        .into_iter()
        .collect();
    spans.extend(directives.iter().map(|d| d.range.clone()));

    let preserve = merge_spans(spans);
    let escaped = escape_outside(layout, &preserve);
    debug_assert_eq!(escaped.spans.len(), directives.len());

    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut out = String::with_capacity(escaped.text.len() * 4);
    let mut cursor = 0usize;
    for (idx, (directive, span)) in directives.iter().zip(&escaped.spans).enumerate() {
        out.push_str(&escaped.text[cursor..span.start]);
        if Some(idx) == time_idx {
            let time_pattern = timespec::translate(directive.param().unwrap_or_default());
            if seen.insert(TIMESTAMP_FIELD) {
                out.push_str(&format!("(?P<{}>{})", TIMESTAMP_FIELD, time_pattern));
            } else {
                out.push_str(&format!("(?:{})", time_pattern));
            }
        } else {
            let fragment = directive::lookup(directive.token).ok_or_else(|| {
                tracing::warn!(token = directive.token, layout, "unsupported directive in layout");
                Error::UnsupportedDirective { token: directive.token.to_string() }
            })?;
            out.push_str(&fragment.render(&mut seen));
        }
        cursor = span.end;
    }
    out.push_str(&escaped.text[cursor..]);

    if !out.is_empty() {
        out.insert(0, '^');
    }
    tracing::debug!(layout, pattern = out.as_str(), "compiled layout");
    Ok(out)
}
