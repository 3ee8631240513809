//! Error types for Folio.
//!
//! Library crates use [`FolioError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Folio operations.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// DOCX reading or writing error.
    #[error("document error: {message}")]
    Document { message: String },

    /// Checkpoint or block store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text transformation failed (bridge, model, or protocol).
    #[error("transform error: {0}")]
    Transform(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (gaps in block numbering, bad descriptor, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Front-matter descriptor missing or unusable.
    #[error("front matter error: {message}")]
    FrontMatter { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FolioError>;

impl FolioError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a document error from any displayable message.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a front-matter error from any displayable message.
    pub fn front_matter(msg: impl Into<String>) -> Self {
        Self::FrontMatter {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether re-running the same invocation can make progress.
    ///
    /// Transform, storage and I/O failures leave the checkpoint at the last
    /// committed block, so a plain re-run resumes. The rest, including
    /// duplicate block artifacts on disk, need an operator.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transform(_) | Self::Storage(_) | Self::Io { .. }
        )
    }
}
