//! Engine configuration parsed from `gallery-sync.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a repository in the current directory.
//!
//! ```toml
//! [repository]
//! path = "/srv/gallery"
//! remote = "origin"
//! branch = "main"
//! remote_url = "git@example.com:photos/gallery.git"
//!
//! [commit]
//! author_name = "Gallery Sync"
//! author_email = "sync@example.com"
//!
//! [log]
//! file = ".gallery/sync-log.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use gallery_git::CommitIdentity;
use gallery_meta::FileAssetValidator;
use gallery_meta::validation::{DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};

use crate::log::DEFAULT_CAPACITY;
use crate::{Error, Result};

/// Config file looked up when none is given explicitly
pub const DEFAULT_CONFIG_FILE: &str = "gallery-sync.toml";

/// Repository identity and layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySection {
    /// Working tree root
    pub path: PathBuf,
    /// Remote to sync with
    pub remote: String,
    /// The single branch that is synced
    pub branch: String,
    /// Expected URL of `remote`; checked when set
    pub remote_url: Option<String>,
    /// Metadata document, relative to the working tree root
    pub metadata_file: String,
    /// Refuse to sync unless the large-asset extension is configured
    pub require_large_asset_extension: bool,
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            remote_url: None,
            metadata_file: "metadata.json".to_string(),
            require_large_asset_extension: true,
        }
    }
}

/// Commits created by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSection {
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// Per-asset lines listed in a commit message before truncating
    pub max_detail_lines: usize,
}

impl Default for CommitSection {
    fn default() -> Self {
        Self {
            author_name: None,
            author_email: None,
            max_detail_lines: 50,
        }
    }
}

/// Sync log retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub capacity: usize,
    /// Persist the log here; relative paths resolve against the repository root
    pub file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            file: None,
        }
    }
}

/// Checks applied to newly staged assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub allowed_extensions: Vec<String>,
    /// Bytes
    pub max_file_size: u64,
    pub reject_empty: bool,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            reject_empty: true,
        }
    }
}

/// HTTP front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Run one update check through the guard at startup
    pub check_on_startup: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            check_on_startup: true,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub repository: RepositorySection,
    pub commit: CommitSection,
    pub log: LogSection,
    pub validation: ValidationSection,
    pub server: ServerSection,
}

impl SyncConfig {
    /// Parse configuration from TOML content without validating it.
    pub fn parse(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] when `path` does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.repository.remote.trim().is_empty() {
            problems.push("repository.remote must not be empty");
        }
        if self.repository.branch.trim().is_empty() {
            problems.push("repository.branch must not be empty");
        }
        if self.repository.metadata_file.trim().is_empty() {
            problems.push("repository.metadata_file must not be empty");
        }
        if self.log.capacity == 0 {
            problems.push("log.capacity must be at least 1");
        }
        if self.validation.allowed_extensions.is_empty() {
            problems.push("validation.allowed_extensions must not be empty");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig {
                message: problems.join("; "),
            })
        }
    }

    /// Absolute path of the metadata document.
    pub fn metadata_path(&self) -> PathBuf {
        self.repository.path.join(&self.repository.metadata_file)
    }

    /// Where the sync log is persisted, if anywhere.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log
            .file
            .as_ref()
            .map(|file| self.repository.path.join(file))
    }

    /// Commit identity override; only used when both name and email are set.
    pub fn identity(&self) -> Option<CommitIdentity> {
        match (&self.commit.author_name, &self.commit.author_email) {
            (Some(name), Some(email)) => Some(CommitIdentity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    /// Asset validator built from `[validation]`.
    pub fn validator(&self) -> FileAssetValidator {
        FileAssetValidator::new(
            &self.validation.allowed_extensions,
            self.validation.max_file_size,
            self.validation.reject_empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SyncConfig::parse("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.repository.branch, "main");
        assert_eq!(config.log.capacity, 100);
        assert_eq!(config.commit.max_detail_lines, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let config = SyncConfig::parse(
            r#"
[repository]
path = "/srv/gallery"
remote_url = "git@example.com:photos.git"
require_large_asset_extension = false

[commit]
author_name = "Sync Bot"
author_email = "bot@example.com"

[log]
file = "sync-log.json"
"#,
        )
        .unwrap();

        assert_eq!(config.repository.remote, "origin");
        assert!(!config.repository.require_large_asset_extension);
        assert_eq!(
            config.log_path(),
            Some(PathBuf::from("/srv/gallery/sync-log.json"))
        );
        assert_eq!(
            config.identity(),
            Some(CommitIdentity {
                name: "Sync Bot".into(),
                email: "bot@example.com".into(),
            })
        );
    }

    #[test]
    fn test_identity_needs_both_fields() {
        let config = SyncConfig::parse("[commit]\nauthor_name = \"only\"\n").unwrap();
        assert_eq!(config.identity(), None);
    }

    #[test]
    fn test_validate_collects_problems() {
        let config = SyncConfig::parse("[repository]\nbranch = \"\"\n[log]\ncapacity = 0\n").unwrap();
        let Err(Error::InvalidConfig { message }) = config.validate() else {
            panic!("expected InvalidConfig");
        };
        assert!(message.contains("repository.branch"));
        assert!(message.contains("log.capacity"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = SyncConfig::load(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            SyncConfig::parse("[repository\n").unwrap_err(),
            Error::TomlDe(_)
        ));
    }
}
