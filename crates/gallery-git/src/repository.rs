//! Git implementation of [`VcsClient`]
//!
//! Reads go through `git2`. Operations that write objects, move refs or talk to
//! the remote run the `git` binary, so clean/smudge filters and push hooks
//! installed by the large-asset extension are honoured.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use git2::{
    Delta, DiffFindOptions, DiffOptions, ErrorCode, Oid, Repository, RepositoryState, Status,
    StatusOptions, Tree,
};

use crate::client::{
    ChangeKind, Divergence, FileChange, LargeAssetSupport, PullOutcome, RebaseProgress, Revision,
    VcsClient,
};
use crate::command;
use crate::commits::{self, CommitInfo};
use crate::{Error, Result};

/// Author/committer identity used for commits made by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// [`VcsClient`] backed by a local git working tree.
pub struct GitClient {
    workdir: PathBuf,
    remote: String,
    branch: String,
    identity: Option<CommitIdentity>,
}

impl GitClient {
    /// Open the working tree at `workdir`, syncing `branch` with `remote`.
    pub fn open(
        workdir: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self> {
        let requested = workdir.into();
        let repo = Repository::open(&requested).map_err(|_| Error::NotARepository {
            path: requested.clone(),
        })?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NotARepository {
                path: requested.clone(),
            })?;

        Ok(Self {
            workdir,
            remote: remote.into(),
            branch: branch.into(),
            identity: None,
        })
    }

    /// Commit as `identity` instead of the repository's configured user.
    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> Result<PathBuf> {
        Ok(self.repo()?.path().to_path_buf())
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.workdir)?)
    }

    fn config_overrides(&self) -> Vec<(String, String)> {
        match &self.identity {
            Some(identity) => vec![
                ("user.name".to_string(), identity.name.clone()),
                ("user.email".to_string(), identity.email.clone()),
            ],
            None => Vec::new(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        command::run(&self.workdir, &self.config_overrides(), args)
    }

    fn git_output(&self, args: &[&str]) -> Result<std::process::Output> {
        command::output(&self.workdir, &self.config_overrides(), args)
    }

    fn upstream_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    fn upstream_oid(&self, repo: &Repository) -> Result<Option<Oid>> {
        match repo.find_reference(&self.upstream_ref()) {
            Ok(reference) => Ok(Some(reference.peel_to_commit()?.id())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_oid(&self, repo: &Repository, rev: &Revision) -> Result<Option<Oid>> {
        match rev {
            Revision::Head => head_oid(repo),
            Revision::Upstream => self.upstream_oid(repo),
            Revision::MergeBase => {
                let head = head_oid(repo)?;
                let upstream = self.upstream_oid(repo)?;
                match (head, upstream) {
                    (Some(head), Some(upstream)) => match repo.merge_base(head, upstream) {
                        Ok(base) => Ok(Some(base)),
                        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                        Err(e) => Err(e.into()),
                    },
                    (Some(head), None) => Ok(Some(head)),
                    (None, _) => Ok(None),
                }
            }
            Revision::Commit(id) => Ok(Some(repo.revparse_single(id)?.peel_to_commit()?.id())),
            Revision::Index | Revision::WorkingTree => Ok(None),
        }
    }

    fn tree_at<'r>(&self, repo: &'r Repository, rev: &Revision) -> Result<Option<Tree<'r>>> {
        match self.resolve_oid(repo, rev)? {
            Some(oid) => Ok(Some(repo.find_commit(oid)?.tree()?)),
            None => Ok(None),
        }
    }
}

fn head_oid(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?.id())),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn path_string(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn changes_from_diff(diff: &git2::Diff<'_>) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for delta in diff.deltas() {
        let new_path = path_string(delta.new_file().path());
        let old_path = path_string(delta.old_file().path());
        let change = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => {
                new_path.map(|p| FileChange::new(p, ChangeKind::Added))
            }
            Delta::Deleted => old_path.map(|p| FileChange::new(p, ChangeKind::Deleted)),
            Delta::Modified | Delta::Typechange => {
                new_path.map(|p| FileChange::new(p, ChangeKind::Modified))
            }
            Delta::Renamed => match (old_path, new_path) {
                (Some(old), Some(new)) => Some(FileChange::renamed(old, new)),
                _ => None,
            },
            Delta::Conflicted => new_path
                .or(old_path)
                .map(|p| FileChange::new(p, ChangeKind::Conflicted)),
            Delta::Ignored | Delta::Unmodified | Delta::Unreadable => None,
        };
        changes.extend(change);
    }
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Attribute patterns that route files through the `lfs` filter.
fn parse_lfs_patterns(attributes: &str) -> Vec<String> {
    attributes
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pattern = parts.next()?;
            parts
                .any(|attr| attr == "filter=lfs")
                .then(|| pattern.to_string())
        })
        .collect()
}

impl VcsClient for GitClient {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn remote_name(&self) -> &str {
        &self.remote
    }

    fn branch_name(&self) -> &str {
        &self.branch
    }

    fn fetch(&self) -> Result<()> {
        if self.remote_url()?.is_none() {
            return Err(Error::RemoteNotFound {
                name: self.remote.clone(),
            });
        }

        let refspec = format!(
            "+refs/heads/{}:refs/remotes/{}/{}",
            self.branch, self.remote, self.branch
        );
        let out = self.git_output(&["fetch", "--quiet", &self.remote, &refspec])?;
        if out.status.success() {
            return Ok(());
        }

        let message = command::failure_text(&out);
        if message.contains("couldn't find remote ref") {
            // Empty remote: nothing to track yet, the first push creates the branch.
            tracing::debug!(remote = %self.remote, branch = %self.branch, "Remote branch does not exist yet");
            return Ok(());
        }
        Err(Error::FetchFailed { message })
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        match repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn divergence(&self) -> Result<Divergence> {
        let repo = self.repo()?;
        let head = head_oid(&repo)?;
        let upstream = self.upstream_oid(&repo)?;

        let (ahead, behind) = match (head, upstream) {
            (Some(head), Some(upstream)) => repo.graph_ahead_behind(head, upstream)?,
            (Some(head), None) => (commits::count_commits(&repo, head)?, 0),
            (None, Some(upstream)) => (0, commits::count_commits(&repo, upstream)?),
            (None, None) => (0, 0),
        };

        Ok(Divergence {
            ahead,
            behind,
            has_upstream: upstream.is_some(),
        })
    }

    fn working_tree_status(&self) -> Result<Vec<FileChange>> {
        let repo = self.repo()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(true)
            .renames_index_to_workdir(true);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut changes = Vec::new();

        for entry in statuses.iter() {
            let status = entry.status();
            let Some(path) = entry.path().map(|p| p.replace('\\', "/")) else {
                continue;
            };

            let change = if status.is_conflicted() {
                FileChange::new(path, ChangeKind::Conflicted)
            } else if status.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
                // entry.path() is the old side of a rename; take both sides from the delta
                let delta = if status.contains(Status::INDEX_RENAMED) {
                    entry.head_to_index()
                } else {
                    entry.index_to_workdir()
                };
                delta
                    .and_then(|d| {
                        let old = path_string(d.old_file().path())?;
                        let new = path_string(d.new_file().path())?;
                        Some(FileChange::renamed(old, new))
                    })
                    .unwrap_or_else(|| FileChange::new(path, ChangeKind::Renamed))
            } else if status.intersects(Status::INDEX_NEW | Status::WT_NEW) {
                FileChange::new(path, ChangeKind::Added)
            } else if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
                FileChange::new(path, ChangeKind::Deleted)
            } else if status.intersects(
                Status::INDEX_MODIFIED
                    | Status::WT_MODIFIED
                    | Status::INDEX_TYPECHANGE
                    | Status::WT_TYPECHANGE,
            ) {
                FileChange::new(path, ChangeKind::Modified)
            } else {
                continue;
            };
            changes.push(change);
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }

    fn conflicted_paths(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let index = repo.index()?;
        if !index.has_conflicts() {
            return Ok(Vec::new());
        }

        let mut paths = BTreeSet::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            if let Some(entry) = entry {
                paths.insert(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        Ok(paths.into_iter().collect())
    }

    fn last_commit(&self) -> Result<Option<CommitInfo>> {
        let repo = self.repo()?;
        match head_oid(&repo)? {
            Some(oid) => Ok(commits::list_recent_commits(&repo, oid, 1)?.into_iter().next()),
            None => Ok(None),
        }
    }

    fn resolve(&self, rev: &Revision) -> Result<Option<String>> {
        let repo = self.repo()?;
        Ok(self.resolve_oid(&repo, rev)?.map(|oid| oid.to_string()))
    }

    fn diff(&self, from: &Revision, to: &Revision) -> Result<Vec<FileChange>> {
        let repo = self.repo()?;
        let old_tree = self.tree_at(&repo, from)?;

        let mut diff = if *to == Revision::WorkingTree {
            let mut opts = DiffOptions::new();
            opts.include_untracked(true).recurse_untracked_dirs(true);
            repo.diff_tree_to_workdir_with_index(old_tree.as_ref(), Some(&mut opts))?
        } else if *to == Revision::Index {
            repo.diff_tree_to_index(old_tree.as_ref(), None, None)?
        } else {
            let new_tree = self.tree_at(&repo, to)?;
            repo.diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), None)?
        };

        let mut find = DiffFindOptions::new();
        find.renames(true).for_untracked(true);
        diff.find_similar(Some(&mut find))?;

        Ok(changes_from_diff(&diff))
    }

    fn read_file(&self, rev: &Revision, path: &str) -> Result<Option<Vec<u8>>> {
        if *rev == Revision::WorkingTree {
            return match fs::read(self.workdir.join(path)) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        let repo = self.repo()?;
        if *rev == Revision::Index {
            let index = repo.index()?;
            let Some(entry) = index.get_path(Path::new(path), 0) else {
                return Ok(None);
            };
            return Ok(Some(repo.find_blob(entry.id)?.content().to_vec()));
        }
        let Some(tree) = self.tree_at(&repo, rev)? else {
            return Ok(None);
        };
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(&repo)?;
        Ok(object.as_blob().map(|blob| blob.content().to_vec()))
    }

    fn remote_url(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        match repo.find_remote(&self.remote) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::InvalidSpec => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn large_asset_support(&self) -> Result<LargeAssetSupport> {
        let repo = self.repo()?;
        let config = repo.config()?;
        let filter_configured = ["filter.lfs.process", "filter.lfs.clean"].iter().any(|key| {
            config
                .get_string(key)
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false)
        });

        let tracked_patterns = match fs::read_to_string(self.workdir.join(".gitattributes")) {
            Ok(content) => parse_lfs_patterns(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(LargeAssetSupport {
            filter_configured,
            tracked_patterns,
        })
    }

    fn stage_all(&self) -> Result<()> {
        self.git(&["add", "--all"])?;
        Ok(())
    }

    fn unstage(&self, path: &str) -> Result<()> {
        self.git(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--", path])?;
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let repo = self.repo()?;
        let head_tree = self.tree_at(&repo, &Revision::Head)?;
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff.deltas().len() > 0)
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.git(&["commit", "--quiet", "-m", message])?;
        self.git(&["rev-parse", "--short=7", "HEAD"])
    }

    fn reword_head(&self, message: &str) -> Result<String> {
        self.git(&["commit", "--quiet", "--amend", "--only", "-m", message])?;
        self.git(&["rev-parse", "--short=7", "HEAD"])
    }

    fn pull_rebase(&self, autostash: bool) -> Result<PullOutcome> {
        let before = self.divergence()?;
        if !before.has_upstream || before.behind == 0 {
            return Ok(PullOutcome::UpToDate);
        }

        let upstream = self.upstream_ref();
        if before.ahead == 0 {
            let out = self.git_output(&["merge", "--ff-only", "--quiet", &upstream])?;
            if !out.status.success() {
                return Err(Error::RebaseFailed {
                    message: command::failure_text(&out),
                });
            }
            return Ok(PullOutcome::FastForwarded {
                commits: before.behind,
            });
        }

        let mut args = vec!["rebase", "--quiet"];
        if autostash {
            args.push("--autostash");
        }
        args.push(&upstream);

        let out = self.git_output(&args)?;
        if out.status.success() {
            return Ok(PullOutcome::Rebased {
                commits: before.behind,
            });
        }

        let paths = self.conflicted_paths()?;
        if self.operation_in_progress()? && !paths.is_empty() {
            return Ok(PullOutcome::Conflicted { paths });
        }

        let message = command::failure_text(&out);
        self.abort_in_progress()?;
        Err(Error::RebaseFailed { message })
    }

    fn take_upstream(&self, paths: &[String]) -> Result<()> {
        // During a rebase "ours" is the branch being rebased onto: the upstream.
        let upstream_deleted: BTreeSet<String> = {
            let repo = self.repo()?;
            let index = repo.index()?;
            let mut deleted = BTreeSet::new();
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                if conflict.our.is_none()
                    && let Some(entry) = conflict.their.as_ref().or(conflict.ancestor.as_ref())
                {
                    deleted.insert(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
            deleted
        };

        for path in paths {
            if upstream_deleted.contains(path) {
                self.git(&["rm", "--quiet", "--force", "--ignore-unmatch", "--", path])?;
            } else {
                self.git(&["checkout", "--ours", "--", path])?;
                self.git(&["add", "--", path])?;
            }
        }
        Ok(())
    }

    fn continue_rebase(&self) -> Result<RebaseProgress> {
        // A commit whose every change lost to the upstream has nothing left to apply.
        let args: &[&str] = if self.has_staged_changes()? {
            &["rebase", "--continue"]
        } else {
            &["rebase", "--skip"]
        };
        let out = self.git_output(args)?;

        if !self.operation_in_progress()? {
            return Ok(RebaseProgress::Finished);
        }
        let paths = self.conflicted_paths()?;
        if !paths.is_empty() {
            return Ok(RebaseProgress::Conflicted { paths });
        }
        Err(Error::RebaseFailed {
            message: command::failure_text(&out),
        })
    }

    fn operation_in_progress(&self) -> Result<bool> {
        Ok(self.repo()?.state() != RepositoryState::Clean)
    }

    fn abort_in_progress(&self) -> Result<bool> {
        let state = self.repo()?.state();
        let args: &[&str] = match state {
            RepositoryState::Clean => return Ok(false),
            RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge
            | RepositoryState::ApplyMailboxOrRebase => &["rebase", "--abort"],
            RepositoryState::ApplyMailbox => &["am", "--abort"],
            RepositoryState::Merge => &["merge", "--abort"],
            RepositoryState::CherryPick | RepositoryState::CherryPickSequence => {
                &["cherry-pick", "--abort"]
            }
            RepositoryState::Revert | RepositoryState::RevertSequence => &["revert", "--abort"],
            RepositoryState::Bisect => &["bisect", "reset"],
        };

        tracing::warn!(state = ?state, "Aborting in-progress repository operation");
        self.git(args)?;
        Ok(true)
    }

    fn push(&self) -> Result<()> {
        if self.current_branch()?.is_none() {
            return Err(Error::DetachedHead);
        }
        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        let out = self.git_output(&["push", &self.remote, &refspec])?;
        if out.status.success() {
            return Ok(());
        }

        let message = command::failure_text(&out);
        if message.contains("[rejected]")
            || message.contains("non-fast-forward")
            || message.contains("fetch first")
        {
            return Err(Error::PushRejected { message });
        }
        Err(Error::PushFailed { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_lfs_patterns_from_attributes() {
        let attributes = "\
# large binaries
*.jpg filter=lfs diff=lfs merge=lfs -text
*.png filter=lfs diff=lfs merge=lfs -text

*.json text
";
        assert_eq!(parse_lfs_patterns(attributes), vec!["*.jpg", "*.png"]);
    }

    #[test]
    fn open_rejects_non_repository() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = GitClient::open(temp.path(), "origin", "main")
            .err()
            .expect("plain directory is not a repository");
        assert!(matches!(err, Error::NotARepository { .. }));
    }
}
