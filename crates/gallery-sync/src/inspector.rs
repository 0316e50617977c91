//! Repository state inspection
//!
//! Anything that reports ahead/behind counts fetches first: counts taken
//! against a stale tracking branch always under-report incoming commits.

use gallery_git::{CommitInfo, Divergence, FileChange, VcsClient};
use serde::Serialize;

use crate::Result;
use crate::config::RepositorySection;

/// Snapshot of the repository, computed fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    pub current_branch: Option<String>,
    pub commits_ahead: usize,
    pub commits_behind: usize,
    pub working_tree_files: Vec<FileChange>,
    pub last_commit: Option<CommitInfo>,
}

/// Result of checking the repository against the configured expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityReport {
    pub branch_ok: bool,
    pub remote_ok: bool,
    pub large_asset_extension_ok: bool,
    pub errors: Vec<String>,
}

impl IdentityReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reads repository state on behalf of the rest of the engine.
pub struct Inspector<'a> {
    vcs: &'a dyn VcsClient,
    expected: &'a RepositorySection,
    fetch: bool,
}

impl<'a> Inspector<'a> {
    pub fn new(vcs: &'a dyn VcsClient, expected: &'a RepositorySection) -> Self {
        Self {
            vcs,
            expected,
            fetch: true,
        }
    }

    /// Report against the remote-tracking refs as last fetched.
    ///
    /// Used while a transaction holds the guard: it is fetching already, and a
    /// second fetch would contend with it for the same ref locks.
    pub fn without_fetch(mut self) -> Self {
        self.fetch = false;
        self
    }

    /// Fetch, then report branch, divergence, working tree and last commit.
    pub fn inspect(&self) -> Result<RepositoryStatus> {
        let divergence = self.divergence()?;
        Ok(RepositoryStatus {
            current_branch: self.vcs.current_branch()?,
            commits_ahead: divergence.ahead,
            commits_behind: divergence.behind,
            working_tree_files: self.vcs.working_tree_status()?,
            last_commit: self.vcs.last_commit()?,
        })
    }

    /// Fetch, then report ahead/behind.
    pub fn divergence(&self) -> Result<Divergence> {
        if self.fetch {
            self.vcs.fetch()?;
        }
        Ok(self.vcs.divergence()?)
    }

    /// Check branch, remote and large-asset extension in one pass, collecting
    /// every problem instead of stopping at the first.
    pub fn verify_identity(&self) -> IdentityReport {
        let mut report = IdentityReport::default();

        match self.vcs.current_branch() {
            Ok(Some(branch)) if branch == self.expected.branch => report.branch_ok = true,
            Ok(Some(branch)) => report.errors.push(format!(
                "checked out branch is '{branch}', expected '{}'",
                self.expected.branch
            )),
            Ok(None) => report.errors.push(format!(
                "HEAD is detached, expected branch '{}'",
                self.expected.branch
            )),
            Err(e) => report.errors.push(format!("cannot read current branch: {e}")),
        }

        match self.vcs.remote_url() {
            Ok(Some(url)) => match &self.expected.remote_url {
                Some(expected) if !same_remote(&url, expected) => report.errors.push(format!(
                    "remote '{}' points to '{url}', expected '{expected}'",
                    self.expected.remote
                )),
                _ => report.remote_ok = true,
            },
            Ok(None) => report.errors.push(format!(
                "remote '{}' is not configured",
                self.expected.remote
            )),
            Err(e) => report.errors.push(format!("cannot read remote configuration: {e}")),
        }

        if self.expected.require_large_asset_extension {
            match self.vcs.large_asset_support() {
                Ok(support) if support.filter_configured => report.large_asset_extension_ok = true,
                Ok(_) => report
                    .errors
                    .push("large-asset extension is not installed in this repository".to_string()),
                Err(e) => report
                    .errors
                    .push(format!("cannot read large-asset configuration: {e}")),
            }
        } else {
            report.large_asset_extension_ok = true;
        }

        if !report.is_ok() {
            tracing::warn!(errors = ?report.errors, "Repository identity check failed");
        }
        report
    }
}

/// Compare remote URLs ignoring a trailing `/` or `.git`.
fn same_remote(actual: &str, expected: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }
    normalize(actual) == normalize(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("git@host:a/b.git", "git@host:a/b", true)]
    #[case("https://host/a/b/", "https://host/a/b.git", true)]
    #[case("https://host/a/b", "https://host/a/c", false)]
    fn test_same_remote(#[case] actual: &str, #[case] expected: &str, #[case] same: bool) {
        assert_eq!(same_remote(actual, expected), same);
    }
}
