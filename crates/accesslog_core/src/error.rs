// error.rs: error type shared by the compiler, registry and config loader
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A directive in a layout has no entry in the directive table.
    #[error("unsupported token in format: {token}")]
    UnsupportedDirective { token: String },

    #[error("invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("duplicate format name: {0}")]
    DuplicateFormat(String),

    #[error("unsupported format config version: {0}")]
    UnsupportedConfigVersion(u32),

    #[error("failed to read format config {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse format config JSON: {0}")]
    ParseConfig(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
