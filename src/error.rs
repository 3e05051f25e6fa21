use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read property source '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse property source '{name}': {source}")]
    ParseError {
        name: String,
        source: toml::de::Error,
    },

    #[error("malformed properties document '{name}' at line {line}: {reason}")]
    MalformedProperties {
        name: String,
        line: usize,
        reason: String,
    },

    #[error("circular reference detected while resolving placeholders")]
    CircularReference,

    #[error("referenced property not found: {0}")]
    ReferenceNotFound(String),

    #[error("invalid reference path: {0}")]
    InvalidReferencePath(String),

    #[error("cannot reference non-scalar value: {0}")]
    NonScalarReference(String),

    #[error("unclosed reference (missing '}}')")]
    UnclosedReference,
}
