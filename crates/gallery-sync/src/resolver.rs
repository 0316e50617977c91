//! Conflict resolution
//!
//! There is exactly one policy: every conflicted path takes the remote
//! version and the local version is dropped. Before anything is dropped the
//! local change is described so the caller can tell the user what was lost.

use std::collections::BTreeSet;

use gallery_git::{FileChange, RebaseProgress, Revision, VcsClient};
use gallery_meta::MetadataDocument;

use crate::summary::Summarizer;
use crate::{Error, Result};

/// Upper bound on resolve/continue rounds; each round consumes one replayed commit.
const MAX_ROUNDS: usize = 256;

/// Local history as it was before the pull that conflicted.
#[derive(Debug, Clone, Default)]
pub struct LocalSide {
    /// Common ancestor with the remote before the pull
    pub base: Option<String>,
    /// Local branch tip before the pull
    pub head: Option<String>,
}

/// What resolution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// One line per local change that was replaced by the remote version
    pub discarded_local_changes: Vec<String>,
    /// Every path that was resolved, across all rounds
    pub resolved_paths: Vec<String>,
}

pub struct ConflictResolver<'a> {
    vcs: &'a dyn VcsClient,
    summarizer: &'a Summarizer,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(vcs: &'a dyn VcsClient, summarizer: &'a Summarizer) -> Self {
        Self { vcs, summarizer }
    }

    /// Resolve a stopped rebase in favour of the remote.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedConflict`] if the repository is not clean
    /// afterwards; the rebase has been aborted by then.
    pub fn resolve(&self, conflicted_paths: &[String], local: &LocalSide) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut seen_items: BTreeSet<String> = BTreeSet::new();
        let mut resolved: BTreeSet<String> = BTreeSet::new();
        let mut paths = conflicted_paths.to_vec();

        for round in 1..=MAX_ROUNDS {
            for item in self.describe_local(&paths, local)? {
                if seen_items.insert(item.clone()) {
                    resolution.discarded_local_changes.push(item);
                }
            }
            tracing::warn!(round, paths = ?paths, "Discarding local side of conflicted paths");

            self.vcs.take_upstream(&paths)?;
            resolved.extend(paths.iter().cloned());

            match self.vcs.continue_rebase()? {
                RebaseProgress::Finished => break,
                RebaseProgress::Conflicted { paths: next } => paths = next,
            }
        }

        resolution.resolved_paths = resolved.into_iter().collect();
        self.verify_clean()?;
        Ok(resolution)
    }

    /// Describe what the local side changed on `paths` since the common base.
    fn describe_local(&self, paths: &[String], local: &LocalSide) -> Result<Vec<String>> {
        let fallback = || {
            paths
                .iter()
                .map(|path| format!("{path}: local changes discarded"))
                .collect::<Vec<_>>()
        };
        let (Some(base), Some(head)) = (&local.base, &local.head) else {
            return Ok(fallback());
        };

        let base = Revision::Commit(base.clone());
        let head = Revision::Commit(head.clone());
        let touched: BTreeSet<&str> = paths.iter().map(String::as_str).collect();
        let files: Vec<FileChange> = self
            .vcs
            .diff(&base, &head)?
            .into_iter()
            .filter(|change| {
                touched.contains(change.path.as_str())
                    || change
                        .previous_path
                        .as_deref()
                        .is_some_and(|p| touched.contains(p))
            })
            .collect();

        let metadata_file = self.summarizer.metadata_file();
        let (prior, current) = if touched.contains(metadata_file) {
            (
                MetadataDocument::from_optional(
                    self.vcs.read_file(&base, metadata_file)?.as_deref(),
                )?,
                MetadataDocument::from_optional(
                    self.vcs.read_file(&head, metadata_file)?.as_deref(),
                )?,
            )
        } else {
            (MetadataDocument::new(), MetadataDocument::new())
        };

        let items = self
            .summarizer
            .summarize_for_upload(&prior, &current, &files)
            .items;
        if items.is_empty() {
            Ok(fallback())
        } else {
            Ok(items)
        }
    }

    /// No conflict entries and no half-finished operation may remain.
    fn verify_clean(&self) -> Result<()> {
        let mut remaining = self.vcs.conflicted_paths()?;
        remaining.extend(
            self.vcs
                .working_tree_status()?
                .into_iter()
                .filter(|c| c.kind == gallery_git::ChangeKind::Conflicted)
                .map(|c| c.path),
        );
        let in_progress = self.vcs.operation_in_progress()?;
        if remaining.is_empty() && !in_progress {
            return Ok(());
        }

        remaining.sort();
        remaining.dedup();
        tracing::error!(paths = ?remaining, in_progress, "Repository not clean after conflict resolution");
        self.vcs.abort_in_progress()?;
        Err(Error::UnresolvedConflict { paths: remaining })
    }
}
