//! Error types for gallery-meta

use std::path::PathBuf;

/// Result type for gallery-meta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gallery-meta operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid metadata document: {message}")]
    InvalidDocument { message: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
