// format.rs: format definitions (layout or raw regex) and their compiled form
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::matcher::{CompiledPattern, FieldMap};

/// How a format describes its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatKind {
    /// Directive layout such as `%h %l %u %t "%r" %>s %b`.
    Layout(String),
    /// Hand-written regex with named groups, used as is.
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFormatDefinition")]
pub struct FormatDefinition {
    pub name: String,
    pub description: String,
    pub kind: FormatKind,
}

// Config shape: exactly one of `layout` / `regex`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFormatDefinition {
    name: String,
    #[serde(default)]
    description: Option<String>,
    layout: Option<String>,
    regex: Option<String>,
}

impl TryFrom<RawFormatDefinition> for FormatDefinition {
    type Error = String;

    fn try_from(raw: RawFormatDefinition) -> std::result::Result<Self, Self::Error> {
        let kind = match (raw.layout, raw.regex) {
            (Some(layout), None) => FormatKind::Layout(layout),
            (None, Some(regex)) => FormatKind::Regex(regex),
            (Some(_), Some(_)) => {
                return Err(format!("format {} sets both layout and regex", raw.name))
            }
            (None, None) => return Err(format!("format {} needs a layout or a regex", raw.name)),
        };
        if raw.name.trim().is_empty() {
            return Err("format name must not be empty".to_string());
        }
        Ok(Self { name: raw.name, description: raw.description.unwrap_or_default(), kind })
    }
}

impl FormatDefinition {
    pub fn layout(name: &str, description: &str, layout: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: FormatKind::Layout(layout.to_string()),
        }
    }

    pub fn regex(name: &str, description: &str, regex: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: FormatKind::Regex(regex.to_string()),
        }
    }

    pub fn compile(&self) -> Result<Format> {
        let pattern = match &self.kind {
            FormatKind::Layout(layout) => CompiledPattern::from_layout(layout)?,
            FormatKind::Regex(regex) => CompiledPattern::from_regex(regex)?,
        };
        tracing::debug!(name = %self.name, fields = pattern.fields().len(), "format compiled");
        Ok(Format { definition: self.clone(), pattern })
    }
}

/// An activated format: its definition plus the compiled pattern.
#[derive(Debug, Clone)]
pub struct Format {
    definition: FormatDefinition,
    pattern: CompiledPattern,
}

impl Format {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn fields(&self) -> &[String] {
        self.pattern.fields()
    }

    pub fn apply(&self, line: &str) -> Option<FieldMap> {
        self.pattern.apply(line)
    }

    /// Source text keyed by kind (`layout` or `regex`).
    pub fn properties(&self) -> BTreeMap<&'static str, String> {
        let mut props = BTreeMap::new();
        match &self.definition.kind {
            FormatKind::Layout(layout) => props.insert("layout", layout.clone()),
            FormatKind::Regex(regex) => props.insert("regex", regex.clone()),
        };
        props
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatDefinition, FormatKind};
    use crate::error::Error;

    #[test]
    fn test_definition_from_json() {
        let def: FormatDefinition =
            serde_json::from_str(r#"{"name": "mine", "layout": "%h %>s"}"#).unwrap();
        assert_eq!(def.kind, FormatKind::Layout("%h %>s".to_string()));
        assert_eq!(def.description, "");

        let def: FormatDefinition = serde_json::from_str(
            r#"{"name": "raw", "description": "d", "regex": "^(?P<remote_addr>\\S+)"}"#,
        )
        .unwrap();
        assert!(matches!(def.kind, FormatKind::Regex(_)));
    }

    #[test]
    fn test_definition_requires_exactly_one_kind() {
        let both = r#"{"name": "x", "layout": "%h", "regex": "^x"}"#;
        assert!(serde_json::from_str::<FormatDefinition>(both).is_err());
        let neither = r#"{"name": "x"}"#;
        assert!(serde_json::from_str::<FormatDefinition>(neither).is_err());
        let blank = r#"{"name": " ", "layout": "%h"}"#;
        assert!(serde_json::from_str::<FormatDefinition>(blank).is_err());
    }

    #[test]
    fn test_compile_and_apply() {
        let format = FormatDefinition::layout("t", "test", r#"%h "%r" %>s"#).compile().unwrap();
        assert_eq!(format.name(), "t");
        assert_eq!(format.properties().get("layout").map(String::as_str), Some(r#"%h "%r" %>s"#));
        let map = format.apply(r#"10.0.0.1 "GET / HTTP/1.1" 200"#).unwrap();
        assert_eq!(map["status"].as_deref(), Some("200"));
        assert_eq!(map["request_uri"].as_deref(), Some("/"));
    }

    #[test]
    fn test_compile_rejects_unsupported_layout() {
        let err = FormatDefinition::layout("bad", "", "%h %{X-RANDOM-IP}i").compile().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDirective { .. }));
    }
}
