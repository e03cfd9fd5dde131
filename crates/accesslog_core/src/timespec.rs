// timespec.rs: strftime-style specifiers inside `%{...}t` -> regex
//
// Unknown specifiers are not an error: they are matched literally, so a layout
// using one compiles and the worst case is lines that fail to match.
use memchr::memchr;

fn specifier_pattern(spec: char) -> Option<&'static str> {
    let pattern = match spec {
        'a' | 'A' => r"[A-Za-z]+", // weekday name
        'b' => r"[A-Za-z]{3}",     // abbreviated month
        'B' => r"[A-Za-z]+",
        'c' | 'x' | 'X' => r".+", // locale dependent
        'd' => r"\d{2}",
        'e' => r"\d{1,2}",
        'f' => r"\d{6}",
        'H' | 'I' => r"\d{2}",
        'j' => r"\d{3}",
        'm' | 'M' => r"\d{2}",
        'p' => r"[APM]+",
        'S' => r"\d{2}",
        'U' | 'W' => r"\d{2}",
        'w' => r"\d",
        'y' => r"\d{2}",
        'Y' => r"\d{4}",
        'z' => r"[+-]\d{4}",
        'Z' => r"[A-Za-z]+",
        _ => return None,
    };
    Some(pattern)
}

/// Translate the body of a time directive (e.g. `%d/%b/%Y:%H:%M:%S %z`) into a
/// pattern fragment. Literal text is escaped.
pub fn translate(spec: &str) -> String {
    let bytes = spec.as_bytes();
    let mut out = String::with_capacity(spec.len() * 4);
    let mut i = 0usize;
    while let Some(off) = memchr(b'%', &bytes[i..]) {
        let pct = i + off;
        out.push_str(&regex::escape(&spec[i..pct]));
        let Some(next) = spec[pct + 1..].chars().next() else {
            // trailing '%'
            out.push('%');
            i = spec.len();
            break;
        };
        match specifier_pattern(next) {
            Some(p) => out.push_str(p),
            None => out.push_str(&regex::escape(&spec[pct..pct + 1 + next.len_utf8()])),
        }
        i = pct + 1 + next.len_utf8();
    }
    out.push_str(&regex::escape(&spec[i..]));
    out
}
