// layout.rs: locate directive tokens inside a layout string
//
// Grammar, where `x` is an ASCII letter:
//   %x          bare
//   %<x  %>x    qualified (original / final value)
//   %{param}x   parameterized; param is any non-empty run without '}'
//   %%          literal percent
// A '%' that starts none of these is plain text.
use memchr::memchr;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Bare,
    Qualified,
    Parameterized,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSpan<'a> {
    pub range: Range<usize>,
    pub token: &'a str,
    pub shape: Shape,
}

impl<'a> DirectiveSpan<'a> {
    /// Text between the braces of a parameterized directive.
    pub fn param(&self) -> Option<&'a str> {
        match self.shape {
            Shape::Parameterized => Some(&self.token[2..self.token.len() - 2]),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        self.token.as_bytes()[self.token.len() - 1] as char
    }

    /// `%{...}t`: a time directive whose parameter is a strftime-style spec.
    pub fn is_time(&self) -> bool {
        self.shape == Shape::Parameterized && self.letter() == 't'
    }
}

fn directive_at(bytes: &[u8], pct: usize) -> Option<(usize, Shape)> {
    let next = *bytes.get(pct + 1)?;
    if next == b'%' {
        return Some((pct + 2, Shape::Percent));
    }
    if next.is_ascii_alphabetic() {
        return Some((pct + 2, Shape::Bare));
    }
    if next == b'<' || next == b'>' {
        return match bytes.get(pct + 2) {
            Some(b) if b.is_ascii_alphabetic() => Some((pct + 3, Shape::Qualified)),
            _ => None,
        };
    }
    if next == b'{' {
        let close = pct + 2 + memchr(b'}', &bytes[pct + 2..])?;
        if close == pct + 2 {
            return None;
        }
        return match bytes.get(close + 1) {
            Some(b) if b.is_ascii_alphabetic() => Some((close + 2, Shape::Parameterized)),
            _ => None,
        };
    }
    None
}

/// All directive spans of `layout`, left to right and non-overlapping.
pub fn scan(layout: &str) -> Vec<DirectiveSpan<'_>> {
    let bytes = layout.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while let Some(off) = memchr(b'%', &bytes[i..]) {
        let pct = i + off;
        match directive_at(bytes, pct) {
            Some((end, shape)) => {
                out.push(DirectiveSpan { range: pct..end, token: &layout[pct..end], shape });
                i = end;
            }
            None => i = pct + 1,
        }
    }
    out
}
