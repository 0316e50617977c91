//! Persistent access to the metadata document

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, MetadataDocument, Result};

/// Where the working copy of the metadata document lives.
pub trait MetadataStore: Send + Sync {
    /// Current document. A missing document reads as empty.
    fn read(&self) -> Result<MetadataDocument>;

    /// Replace the document.
    fn write(&self, document: &MetadataDocument) -> Result<()>;
}

/// JSON file on disk, read under a shared lock and replaced atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for JsonFileStore {
    fn read(&self) -> Result<MetadataDocument> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Metadata document missing, using empty");
                return Ok(MetadataDocument::new());
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        FileExt::lock_shared(&file).map_err(|_| Error::LockFailed {
            path: self.path.clone(),
        })?;
        let mut content = Vec::new();
        let read = file.read_to_end(&mut content);
        // also released on drop
        let _ = FileExt::unlock(&file);
        read.map_err(|e| Error::io(&self.path, e))?;

        MetadataDocument::from_slice(&content)
    }

    fn write(&self, document: &MetadataDocument) -> Result<()> {
        write_atomic(&self.path, document.to_json_pretty()?.as_bytes())
    }
}

/// Write `content` to `path` via a locked temp file in the same directory and
/// a rename, so readers never observe a partial document.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    FileExt::unlock(&temp_file).map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}
