//! `git` CLI helpers for fixtures.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Run `git <args>` in `dir` and return trimmed stdout.
///
/// # Panics
/// Panics if git cannot be spawned or exits non-zero.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_EDITOR", "true")
        .env("LC_ALL", "C")
        .output()
        .unwrap_or_else(|e| panic!("git: failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "git: `git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write `contents` to `rel` under `root`, creating parent directories.
///
/// # Panics
/// Panics if the filesystem operations fail.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("write_file: failed to create {}: {e}", parent.display()));
    }
    fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("write_file: failed to write {}: {e}", path.display()));
}

/// Read `rel` under `root` as UTF-8.
///
/// # Panics
/// Panics if the file is missing or not UTF-8.
pub fn read_file(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read_file: failed to read {}: {e}", path.display()))
}

/// Delete `rel` under `root`.
///
/// # Panics
/// Panics if the file cannot be removed.
pub fn remove_file(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::remove_file(&path)
        .unwrap_or_else(|e| panic!("remove_file: failed to remove {}: {e}", path.display()));
}
