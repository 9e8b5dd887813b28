use std::path::PathBuf;
use thiserror::Error;

use crate::format::Format;

/// A malformed config path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Config path segments should be strings, got {0}")]
    NotText(String),

    #[error("Config path segments should be non-empty strings, got an empty one")]
    EmptySegment,

    #[error("Config path must not be empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config path: {0}")]
    Path(#[from] PathError),

    #[error("Unknown config item: {0}")]
    UnknownItem(String),

    #[error("Config value missing: {0} has no value and no default")]
    ValueMissing(String),

    #[error("Config item {0} already present")]
    DuplicateItem(String),

    #[error("{path} has more than 2 path segments and cannot be written as {format}")]
    NotImplementedDepth { path: String, format: Format },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid declaration: {0}")]
    Declaration(String),

    #[error("{0} is a section, name an option to read a value")]
    SectionValue(String),

    #[error("{0} is a section, not an item")]
    NotAnItem(String),

    #[error("{0} is an item, not a section")]
    NotASection(String),

    #[error("No format registered for {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("Failed to parse {format}: {reason}")]
    ParseError { format: Format, reason: String },

    #[error("Failed to serialize {format}: {reason}")]
    SerializeError { format: Format, reason: String },

    #[error("Failed to access {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}
