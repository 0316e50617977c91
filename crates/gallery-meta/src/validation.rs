//! Asset validation before commit

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Outcome of validating one asset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Pass,
    Fail(String),
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Decides whether an asset file may be committed.
pub trait AssetValidator: Send + Sync {
    fn validate(&self, path: &Path) -> ValidationResult;
}

/// Default size limit: 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Image extensions accepted when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Validates extension, size and, for known image formats, the file signature.
#[derive(Debug, Clone)]
pub struct FileAssetValidator {
    allowed_extensions: BTreeSet<String>,
    max_file_size: u64,
    reject_empty: bool,
}

impl Default for FileAssetValidator {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().copied(),
            DEFAULT_MAX_FILE_SIZE,
            true,
        )
    }
}

impl FileAssetValidator {
    /// Extensions are matched case-insensitively, with or without a leading dot.
    pub fn new<I, S>(allowed_extensions: I, max_file_size: u64, reject_empty: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_size,
            reject_empty,
        }
    }
}

fn signature_matches(extension: &str, head: &[u8]) -> Option<bool> {
    let matches = match extension {
        "jpg" | "jpeg" => head.starts_with(&[0xFF, 0xD8, 0xFF]),
        "png" => head.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        "gif" => head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a"),
        "webp" => head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP",
        _ => return None,
    };
    Some(matches)
}

impl AssetValidator for FileAssetValidator {
    fn validate(&self, path: &Path) -> ValidationResult {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return if extension.is_empty() {
                ValidationResult::Fail("file has no extension".to_string())
            } else {
                ValidationResult::Fail(format!("unsupported file type '.{extension}'"))
            };
        }

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return ValidationResult::Fail("file not found".to_string());
            }
            Err(e) => return ValidationResult::Fail(format!("cannot read file: {e}")),
        };
        if size == 0 {
            return if self.reject_empty {
                ValidationResult::Fail("file is empty".to_string())
            } else {
                ValidationResult::Pass
            };
        }
        if size > self.max_file_size {
            return ValidationResult::Fail(format!(
                "file is too large: {size} bytes (limit {})",
                self.max_file_size
            ));
        }

        let mut head = Vec::with_capacity(12);
        let read = File::open(path).and_then(|file| file.take(12).read_to_end(&mut head));
        if let Err(e) = read {
            return ValidationResult::Fail(format!("cannot read file: {e}"));
        }
        match signature_matches(&extension, &head) {
            Some(false) => {
                ValidationResult::Fail(format!("content is not a valid .{extension} file"))
            }
            _ => ValidationResult::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    #[case("photo.jpg", JPEG)]
    #[case("PHOTO.JPEG", JPEG)]
    #[case("icon.png", PNG)]
    #[case("anim.gif", b"GIF89a....")]
    #[case("pic.webp", b"RIFF\x10\0\0\0WEBPVP8 ")]
    fn test_accepts_valid_images(#[case] name: &str, #[case] content: &[u8]) {
        let dir = TempDir::new().unwrap();
        let path = file(&dir, name, content);
        assert_eq!(FileAssetValidator::default().validate(&path), ValidationResult::Pass);
    }

    #[rstest]
    #[case("tool.exe", b"MZ".as_slice(), "unsupported file type '.exe'")]
    #[case("README", b"text".as_slice(), "file has no extension")]
    #[case("empty.jpg", b"".as_slice(), "file is empty")]
    #[case("fake.png", b"not a png at all".as_slice(), "content is not a valid .png file")]
    fn test_rejects_invalid_files(
        #[case] name: &str,
        #[case] content: &[u8],
        #[case] reason: &str,
    ) {
        let dir = TempDir::new().unwrap();
        let path = file(&dir, name, content);
        assert_eq!(
            FileAssetValidator::default().validate(&path),
            ValidationResult::Fail(reason.to_string())
        );
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = file(&dir, "big.jpg", JPEG);
        let validator = FileAssetValidator::new(["jpg"], 4, true);
        assert!(!validator.validate(&path).is_pass());
    }

    #[test]
    fn test_unknown_signature_extension_passes() {
        let dir = TempDir::new().unwrap();
        let path = file(&dir, "clip.mp4", b"\0\0\0\x18ftypmp42");
        let validator = FileAssetValidator::new([".MP4"], DEFAULT_MAX_FILE_SIZE, true);
        assert!(validator.validate(&path).is_pass());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FileAssetValidator::default().validate(&dir.path().join("gone.jpg"));
        assert_eq!(result, ValidationResult::Fail("file not found".to_string()));
    }
}
