//! Bare remote plus clones, all inside one temporary directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::git::{git, write_file};

/// Metadata document every fixture starts from unless told otherwise.
pub const EMPTY_METADATA: &str = "{}\n";

/// A bare repository acting as the shared remote, with branch `main` seeded by
/// one commit.
///
/// Clones are created next to the bare repository and configured with a test
/// identity. Everything is removed when the fixture is dropped.
pub struct RemoteFixture {
    root: TempDir,
    bare: PathBuf,
}

impl RemoteFixture {
    /// Remote seeded with `README.md` and an empty `metadata.json`.
    pub fn new() -> Self {
        Self::with_files(&[("metadata.json", EMPTY_METADATA.as_bytes())])
    }

    /// Remote whose first commit holds `README.md` plus `files`.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let root = TempDir::new()
            .unwrap_or_else(|e| panic!("RemoteFixture: failed to create temp dir: {e}"));
        let bare = root.path().join("remote.git");
        std::fs::create_dir(&bare)
            .unwrap_or_else(|e| panic!("RemoteFixture: failed to create bare dir: {e}"));
        git(&bare, &["init", "--quiet", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let seed = root.path().join("seed");
        std::fs::create_dir(&seed)
            .unwrap_or_else(|e| panic!("RemoteFixture: failed to create seed dir: {e}"));
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        configure_identity(&seed, "seed");

        write_file(&seed, "README.md", "# Gallery\n");
        for (path, contents) in files {
            write_file(&seed, path, contents);
        }
        git(&seed, &["add", "--all"]);
        git(&seed, &["commit", "--quiet", "-m", "Initial commit"]);

        let url = path_str(&bare);
        git(&seed, &["remote", "add", "origin", &url]);
        git(&seed, &["push", "--quiet", "-u", "origin", "main"]);

        Self { root, bare }
    }

    /// Path of the bare repository, usable as a remote URL.
    pub fn url(&self) -> String {
        path_str(&self.bare)
    }

    /// Clone the remote into `<root>/<name>` and configure a test identity.
    ///
    /// # Panics
    /// Panics if the clone fails.
    pub fn clone_as(&self, name: &str) -> PathBuf {
        let dest = self.root.path().join(name);
        let dest_str = path_str(&dest);
        git(
            self.root.path(),
            &["clone", "--quiet", &self.url(), &dest_str],
        );
        configure_identity(&dest, name);
        dest
    }

    /// Write `files` in the clone at `repo`, commit everything and push.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn commit_and_push(&self, repo: &Path, files: &[(&str, &str)], message: &str) {
        for (path, contents) in files {
            write_file(repo, path, contents);
        }
        git(repo, &["add", "--all"]);
        git(repo, &["commit", "--quiet", "-m", message]);
        git(repo, &["push", "--quiet", "origin", "HEAD:refs/heads/main"]);
    }

    /// Short hash of the remote's `main`.
    pub fn remote_head(&self) -> String {
        git(&self.bare, &["rev-parse", "--short=7", "refs/heads/main"])
    }

    /// Subject lines of the remote's `main`, newest first.
    pub fn remote_log(&self) -> Vec<String> {
        git(&self.bare, &["log", "--format=%s", "refs/heads/main"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Paths tracked on the remote's `main`.
    pub fn remote_files(&self) -> Vec<String> {
        git(&self.bare, &["ls-tree", "-r", "--name-only", "refs/heads/main"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Full message of the remote's newest commit.
    pub fn remote_head_message(&self) -> String {
        git(&self.bare, &["log", "-1", "--format=%B", "refs/heads/main"])
    }
}

impl Default for RemoteFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_identity(repo: &Path, name: &str) {
    git(repo, &["config", "user.name", name]);
    git(repo, &["config", "user.email", &format!("{name}@test.invalid")]);
    git(repo, &["config", "commit.gpgsign", "false"]);
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
