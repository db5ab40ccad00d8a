//! Error types for reading notebooks.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading, converting or describing a notebook.
///
/// Nothing here is retried or downgraded: every variant aborts the
/// document that produced it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is not valid UTF-8", path.display())]
    Encoding { path: PathBuf },

    #[error("'{}' is not a valid notebook: {source}", path.display())]
    MalformedNotebook {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no syntax highlighting available for language '{0}'")]
    UnknownLanguage(String),

    #[error("syntax highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),

    #[error("highlight theme '{0}' is not available")]
    MissingTheme(String),

    #[error("invalid metadata '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    #[error("invalid embedded image: {0}")]
    InvalidImage(#[from] base64::DecodeError),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl Error {
    /// Classify an I/O failure on `path`, splitting out undecodable text.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::InvalidData {
            Error::Encoding { path }
        } else {
            Error::Io { path, source }
        }
    }

    pub(crate) fn metadata(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidMetadata {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
