//! VCS client trait used by the sync engine

use std::path::Path;

use serde::Serialize;

use crate::Result;
use crate::commits::CommitInfo;

/// How a single path differs between two states of the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Conflicted,
}

/// A changed path as reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path relative to the repository root (new path for renames)
    pub path: String,

    /// Kind of change
    #[serde(rename = "changeKind")]
    pub kind: ChangeKind,

    /// Previous path, set only for renames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            previous_path: None,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: to.into(),
            kind: ChangeKind::Renamed,
            previous_path: Some(from.into()),
        }
    }
}

/// A point in history (or the working tree) that content can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// The checked-out commit
    Head,
    /// The remote tracking branch, as of the last fetch
    Upstream,
    /// Common ancestor of HEAD and the upstream; HEAD when there is no upstream
    MergeBase,
    /// An explicit commit id
    Commit(String),
    /// The staging area
    Index,
    /// Files on disk, including untracked ones
    WorkingTree,
}

/// Local/remote divergence of the configured branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Divergence {
    pub ahead: usize,
    pub behind: usize,
    /// Whether the remote tracking branch exists at all
    pub has_upstream: bool,
}

/// Large-asset extension configuration found in the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LargeAssetSupport {
    /// Whether the extension's clean/process filter is configured
    pub filter_configured: bool,
    /// Attribute patterns routed through the extension
    pub tracked_patterns: Vec<String>,
}

/// Result of integrating the upstream branch into the local branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Nothing to integrate
    UpToDate,
    /// Local had no commits of its own; the branch pointer moved forward
    FastForwarded { commits: usize },
    /// Local commits were replayed on top of the upstream
    Rebased { commits: usize },
    /// The replay stopped on conflicting paths; a rebase is in progress
    Conflicted { paths: Vec<String> },
}

/// State of a rebase after a resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseProgress {
    Finished,
    Conflicted { paths: Vec<String> },
}

/// Operations the sync engine needs from the version-control system.
///
/// All paths are relative to the working tree root and use `/` separators.
/// Implementations are bound to one working tree, one remote and one branch.
pub trait VcsClient: Send + Sync {
    /// Root of the working tree
    fn workdir(&self) -> &Path;

    /// Name of the configured remote
    fn remote_name(&self) -> &str;

    /// Name of the configured branch
    fn branch_name(&self) -> &str;

    /// Update the remote tracking branch from the remote.
    fn fetch(&self) -> Result<()>;

    /// Branch HEAD points to, or `None` when detached.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Ahead/behind counts against the tracking branch as it is now (no fetch).
    fn divergence(&self) -> Result<Divergence>;

    /// Uncommitted changes, staged or not, including untracked files.
    fn working_tree_status(&self) -> Result<Vec<FileChange>>;

    /// Paths with unresolved conflict entries in the index.
    fn conflicted_paths(&self) -> Result<Vec<String>>;

    /// Most recent commit on HEAD.
    fn last_commit(&self) -> Result<Option<CommitInfo>>;

    /// Resolve a revision to a full commit id, if it exists.
    fn resolve(&self, rev: &Revision) -> Result<Option<String>>;

    /// Changed paths between two revisions, with renames detected.
    ///
    /// `Index` and `WorkingTree` are only meaningful as the `to` side.
    fn diff(&self, from: &Revision, to: &Revision) -> Result<Vec<FileChange>>;

    /// Raw content of `path` at `rev`, or `None` when it does not exist there.
    fn read_file(&self, rev: &Revision, path: &str) -> Result<Option<Vec<u8>>>;

    /// URL of the configured remote, if the remote exists.
    fn remote_url(&self) -> Result<Option<String>>;

    /// Large-asset extension configuration.
    fn large_asset_support(&self) -> Result<LargeAssetSupport>;

    /// Stage every change in the working tree.
    fn stage_all(&self) -> Result<()>;

    /// Remove `path` from the index, leaving the file on disk.
    fn unstage(&self, path: &str) -> Result<()>;

    /// Whether the index differs from HEAD.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Commit the index, returning the new commit's short hash.
    fn commit(&self, message: &str) -> Result<String>;

    /// Replace the message of the HEAD commit, leaving its content and the
    /// index alone. Returns the rewritten commit's short hash.
    fn reword_head(&self, message: &str) -> Result<String>;

    /// Integrate the tracking branch: fast-forward, or rebase local commits on
    /// top of it. Never creates a merge commit.
    fn pull_rebase(&self, autostash: bool) -> Result<PullOutcome>;

    /// During a stopped rebase, replace each path with the upstream side
    /// (deleting it when the upstream side deleted it) and mark it resolved.
    fn take_upstream(&self, paths: &[String]) -> Result<()>;

    /// Continue a stopped rebase after its conflicts were resolved.
    fn continue_rebase(&self) -> Result<RebaseProgress>;

    /// Whether a rebase or merge is in progress.
    fn operation_in_progress(&self) -> Result<bool>;

    /// Abort an in-progress rebase or merge. Returns whether one was aborted.
    fn abort_in_progress(&self) -> Result<bool>;

    /// Push HEAD to the configured branch on the remote.
    ///
    /// Fails with [`Error::DetachedHead`](crate::Error::DetachedHead) when no
    /// branch is checked out.
    fn push(&self) -> Result<()>;
}
