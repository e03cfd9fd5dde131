// matcher.rs: compiled patterns and per-line field extraction
use regex::Regex;
use std::collections::HashMap;

use crate::compiler::compile_layout;
use crate::error::{Error, Result};

/// Field name -> captured text. `None` marks a field whose group exists in the
/// pattern but did not take part in this match (an optional trailing group);
/// an empty capture is `Some("")`.
pub type FieldMap = HashMap<String, Option<String>>;

/// An immutable, ready-to-match pattern. `Regex` is `Send + Sync`, so one
/// instance can be shared by any number of threads matching lines concurrently.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    fields: Vec<String>,
}

impl CompiledPattern {
    /// Compile a directive layout.
    pub fn from_layout(layout: &str) -> Result<Self> {
        let source = compile_layout(layout)?;
        Self::from_regex(&source)
    }

    /// Wrap a hand-written pattern, bypassing layout compilation.
    pub fn from_regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|source| Error::InvalidPattern { pattern: pattern.to_string(), source })?;
        let fields = regex.capture_names().flatten().map(str::to_string).collect();
        Ok(Self { regex, fields })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Capture names, in the order their groups open in the pattern.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Visit every field of a matching line without building a map. Returns
    /// false, without calling `f`, when the line does not match.
    pub fn apply_with<'l, F>(&self, line: &'l str, mut f: F) -> bool
    where
        F: FnMut(&str, Option<&'l str>),
    {
        let Some(caps) = self.regex.captures(line) else {
            tracing::trace!(pattern = self.regex.as_str(), "line did not match");
            return false;
        };
        for name in &self.fields {
            f(name, caps.name(name).map(|m| m.as_str()));
        }
        true
    }

    /// Match one line. `None` is the no-match outcome.
    pub fn apply(&self, line: &str) -> Option<FieldMap> {
        let mut map = FieldMap::with_capacity(self.fields.len());
        let matched = self.apply_with(line, |name, value| {
            map.insert(name.to_string(), value.map(str::to_string));
        });
        matched.then_some(map)
    }
}
