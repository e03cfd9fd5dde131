// accesslog_core: pure Rust library compiling web-server access-log layouts into
// named-capture patterns and extracting fields from log lines.
//
// Layout -> compiler (directive table + time specifiers + literal escaping)
// -> CompiledPattern, built once per format; CompiledPattern::apply runs per
// line and is safe to share across threads.
pub mod compiler;
pub mod config;
pub mod directive;
pub mod error;
pub mod escape;
pub mod format;
pub mod layout;
pub mod matcher;
pub mod preset;
pub mod row;
pub mod timespec;

pub use compiler::{compile_layout, TIMESTAMP_FIELD};
pub use config::{
    ensure_formats_loaded, formats_from_json, load_formats_internal, refresh_formats, resolve_format,
    FormatConfig, LoadedFormats, FORMAT_CACHE,
};
pub use error::{Error, Result};
pub use format::{Format, FormatDefinition, FormatKind};
pub use matcher::{CompiledPattern, FieldMap};
pub use preset::{default_format, preset, presets, DEFAULT_FORMAT_NAME};
pub use row::{AccessLogRow, NIL_VALUE};

/// Match `line` against `format` and build its output row.
pub fn parse_line_to_row(line: &str, format: &Format) -> Option<AccessLogRow> {
    format.apply(line).map(|fields| AccessLogRow::from_fields(&fields))
}

pub fn hash64_fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325; // FNV offset basis
    for &b in bytes { hash ^= b as u64; hash = hash.wrapping_mul(0x100000001b3); }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash64_fnv1a_deterministic() {
        let h1 = hash64_fnv1a(b"hello world");
        let h2 = hash64_fnv1a(b"hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1, 0x779a65e7023cd2e7);
        assert_eq!(hash64_fnv1a(b""), 0xcbf29ce484222325);
    }

    #[test]
    fn test_parse_line_to_row_with_common_preset() {
        let common = preset("common").unwrap();
        let line = r#"192.168.1.1 - - [24/Feb/2025:12:34:56 +0000] "HEAD /ping HTTP/1.1" 200 -"#;
        let row = parse_line_to_row(line, &common).expect("row");
        assert_eq!(row.get("request_method"), Some("HEAD"));
        assert_eq!(row.get("body_bytes_sent"), None);
        assert_eq!(row.get("remote_user"), None);
        assert_eq!(row.tp_ips, vec!["192.168.1.1"]);
        assert!(parse_line_to_row("not a log line", &common).is_none());
    }
}
