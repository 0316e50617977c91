//! Error types for gallery-sync

use std::path::PathBuf;

/// Result type for gallery-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gallery-sync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsed but is unusable
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The repository is not set up the way the engine expects
    #[error("Repository configuration invalid: {}", errors.join("; "))]
    Identity { errors: Vec<String> },

    /// Conflict resolution left the repository unclean
    #[error("Conflicts could not be resolved automatically: {}", paths.join(", "))]
    UnresolvedConflict { paths: Vec<String> },

    // Transparent wrappers for underlying crate errors
    /// Version-control error from gallery-git
    #[error(transparent)]
    Git(#[from] gallery_git::Error),

    /// Metadata error from gallery-meta
    #[error(transparent)]
    Meta(#[from] gallery_meta::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}
