//! Error types for CourseGraph.
//!
//! Library crates use [`CourseGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all CourseGraph operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The declared file type has no extractor.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Reading or parsing a source document failed.
    #[error("text extraction failed for {path:?}: {message}")]
    ExtractionFailed { path: PathBuf, message: String },

    /// None of the candidate encodings could decode a text file.
    #[error("could not decode {path:?} with any of: {}", tried.join(", "))]
    Decode { path: PathBuf, tried: Vec<String> },

    /// Database write or read failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown status, malformed row, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The run was cancelled before it finished.
    #[error("processing cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseGraphError>;

impl CourseGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a parser or reader failure for the document at `path`.
    pub fn extraction(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::ExtractionFailed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Wrap a storage-layer failure.
    pub fn persistence(msg: impl std::fmt::Display) -> Self {
        Self::Persistence(msg.to_string())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
