// preset.rs: built-in formats, compiled once and shared read-only
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::format::{Format, FormatDefinition};

/// Name of the fallback format used when none is configured.
pub const DEFAULT_FORMAT_NAME: &str = "apache_default";

pub const COMMON_LAYOUT: &str = r#"%h %l %u %t "%r" %>s %b"#;
pub const COMBINED_LAYOUT: &str = r#"%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i""#;

/// Matches both the common and the combined layout: the trailing referer and
/// user-agent pair is optional.
pub const DEFAULT_REGEX: &str = r#"^(?P<remote_addr>[^ ]*) (?P<remote_logname>[^ ]*) (?P<remote_user>[^ ]*) \[(?P<timestamp>[^\]]*)\] "(?P<request_method>\S+)(?: +(?P<request_uri>[^ ]+))?(?: +(?P<server_protocol>\S+))?" (?P<status>[^ ]*) (?P<body_bytes_sent>[^ ]*)(?: "(?P<http_referer>[^"]*)" "(?P<http_user_agent>[^"]*)")?$"#;

static PRESETS: Lazy<Vec<Arc<Format>>> = Lazy::new(|| {
    let definitions = [
        FormatDefinition::regex(
            DEFAULT_FORMAT_NAME,
            "A default regex format that covers both Apache Common and Combined log formats.",
            DEFAULT_REGEX,
        ),
        FormatDefinition::layout("common", "Apache Common Log Format", COMMON_LAYOUT),
        FormatDefinition::layout("combined", "Apache Combined Log Format", COMBINED_LAYOUT),
    ];
    definitions
        .iter()
        .map(|d| {
            let format = d.compile().unwrap_or_else(|e| panic!("preset {} is invalid: {}", d.name, e));
            Arc::new(format)
        })
        .collect()
});

pub fn presets() -> &'static [Arc<Format>] {
    &PRESETS
}

pub fn preset(name: &str) -> Option<Arc<Format>> {
    PRESETS.iter().find(|f| f.name() == name).cloned()
}

pub fn default_format() -> Arc<Format> {
    // always registered above
    PRESETS[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMON_LINE: &str =
        r#"192.168.1.1 - john [24/Feb/2025:12:34:56 +0000] "GET /index.html HTTP/1.1" 200 1234"#;
    const COMBINED_LINE: &str = r#"192.168.1.1 - john [24/Feb/2025:12:34:56 +0000] "GET /index.html HTTP/1.1" 200 1234 "https://example.com" "Mozilla/5.0 (X11)""#;

    #[test]
    fn test_presets_registered() {
        let names: Vec<&str> = presets().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["apache_default", "common", "combined"]);
        assert!(preset("combined").is_some());
        assert!(preset("nginx").is_none());
        assert_eq!(default_format().name(), DEFAULT_FORMAT_NAME);
    }

    #[test]
    fn test_default_matches_common_without_trailing_pair() {
        let map = default_format().apply(COMMON_LINE).expect("common line");
        assert_eq!(map["status"].as_deref(), Some("200"));
        assert_eq!(map["body_bytes_sent"].as_deref(), Some("1234"));
        assert_eq!(map["http_referer"], None);
        assert_eq!(map["http_user_agent"], None);
    }

    #[test]
    fn test_default_matches_combined() {
        let map = default_format().apply(COMBINED_LINE).expect("combined line");
        assert_eq!(map["http_referer"].as_deref(), Some("https://example.com"));
        assert_eq!(map["http_user_agent"].as_deref(), Some("Mozilla/5.0 (X11)"));
    }

    #[test]
    fn test_default_is_anchored_at_end() {
        assert!(default_format().apply(&format!("{} trailing", COMMON_LINE)).is_none());
    }

    #[test]
    fn test_layout_presets_match_their_lines() {
        let common = preset("common").unwrap();
        let combined = preset("combined").unwrap();
        assert!(common.apply(COMMON_LINE).is_some());
        // common ignores the trailing pair, combined requires it
        assert!(common.apply(COMBINED_LINE).is_some());
        assert!(combined.apply(COMMON_LINE).is_none());
        let map = combined.apply(COMBINED_LINE).unwrap();
        assert_eq!(map["http_user_agent"].as_deref(), Some("Mozilla/5.0 (X11)"));
    }
}
