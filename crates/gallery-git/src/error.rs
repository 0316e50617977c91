//! Error types for gallery-git

use std::path::PathBuf;

/// Result type for gallery-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gallery-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("HEAD is detached; a branch must be checked out")]
    DetachedHead,

    #[error("`git {command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Fetch failed: {message}")]
    FetchFailed { message: String },

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Push rejected by remote: {message}")]
    PushRejected { message: String },

    #[error("Rebase failed: {message}")]
    RebaseFailed { message: String },
}
