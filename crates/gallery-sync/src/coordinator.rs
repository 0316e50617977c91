//! Sync transaction coordinator
//!
//! One entry point, [`Coordinator::run`], drives a transaction through
//!
//! ```text
//! Idle -> Committing -> Pulling -> (ConflictDetected -> Resolving -> Pulling) -> Pushing -> Done
//! ```
//!
//! and always returns a [`TransactionReport`]. Errors never escape a
//! transaction: they become a `failed` outcome after any half-finished rebase
//! has been aborted.

use std::collections::BTreeSet;

use gallery_git::{ChangeKind, Divergence, FileChange, PullOutcome, Revision, VcsClient};
use gallery_meta::{AssetValidator, MetadataDocument, ValidationResult};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::inspector::Inspector;
use crate::resolver::{ConflictResolver, LocalSide};
use crate::summary::{DownloadSummary, Summarizer, UploadSummary};
use crate::{Error, Result};

/// What triggered a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Background or page-load check for remote updates
    Check,
    /// User-initiated full sync
    ManualSync,
    /// Hook after an upload
    AutoPush,
}

/// Which steps a transaction may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPlan {
    /// Stage and commit local changes
    pub commit_local: bool,
    /// Push local commits
    pub push: bool,
    /// Pull incoming commits even when there is nothing local to send
    pub force_remote_check: bool,
}

impl OperationKind {
    pub fn plan(self) -> TransactionPlan {
        match self {
            Self::Check => TransactionPlan {
                commit_local: false,
                push: false,
                force_remote_check: true,
            },
            Self::ManualSync => TransactionPlan {
                commit_local: true,
                push: true,
                force_remote_check: true,
            },
            Self::AutoPush => TransactionPlan {
                commit_local: true,
                push: true,
                force_remote_check: false,
            },
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success,
    SkippedNoOp,
    SkippedUncommittedConflict,
    ConflictAutoResolved,
    Failed,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }

    pub fn is_skipped(self) -> bool {
        matches!(self, Self::SkippedNoOp | Self::SkippedUncommittedConflict)
    }
}

/// Transaction state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Committing,
    Pulling,
    ConflictDetected,
    Resolving,
    Pushing,
    Done,
}

/// A staged asset that was dropped before commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub path: String,
    pub reason: String,
}

/// Everything a caller needs to know about one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReport {
    pub kind: OperationKind,
    pub outcome: Outcome,
    pub message: String,
    pub upload: UploadSummary,
    pub download: DownloadSummary,
    /// Short hash of the commit created for local changes
    pub commit: Option<String>,
    pub commits_received: usize,
    pub pulled_changes: bool,
    pub pushed: bool,
    pub conflicted_paths: Vec<String>,
    pub discarded_local_changes: Vec<String>,
    pub validation_errors: Vec<ValidationFailure>,
    pub skip_reason: Option<String>,
    pub error_detail: Option<String>,
}

impl TransactionReport {
    fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            outcome: Outcome::Success,
            message: String::new(),
            upload: UploadSummary::default(),
            download: DownloadSummary::default(),
            commit: None,
            commits_received: 0,
            pulled_changes: false,
            pushed: false,
            conflicted_paths: Vec::new(),
            discarded_local_changes: Vec::new(),
            validation_errors: Vec::new(),
            skip_reason: None,
            error_detail: None,
        }
    }

    pub fn auto_resolved_conflict(&self) -> bool {
        self.outcome == Outcome::ConflictAutoResolved
    }

    fn skip(&mut self, outcome: Outcome, reason: impl Into<String>) {
        let reason = reason.into();
        self.outcome = outcome;
        self.message = reason.clone();
        self.skip_reason = Some(reason);
    }
}

struct Transaction {
    phase: Phase,
    report: TransactionReport,
}

impl Transaction {
    fn enter(&mut self, phase: Phase) {
        tracing::debug!(kind = ?self.report.kind, from = ?self.phase, to = ?phase, "Sync phase");
        self.phase = phase;
    }
}

/// Runs sync transactions against one working tree.
///
/// The caller must hold the concurrency guard for the duration of [`run`](Self::run).
pub struct Coordinator<'a> {
    vcs: &'a dyn VcsClient,
    validator: &'a dyn AssetValidator,
    config: &'a SyncConfig,
    summarizer: Summarizer,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        vcs: &'a dyn VcsClient,
        validator: &'a dyn AssetValidator,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            vcs,
            validator,
            config,
            summarizer: Summarizer::new(config.repository.metadata_file.clone()),
        }
    }

    /// Run one transaction to completion.
    pub fn run(&self, kind: OperationKind) -> TransactionReport {
        let mut tx = Transaction {
            phase: Phase::Idle,
            report: TransactionReport::new(kind),
        };

        if let Err(e) = self.execute(&mut tx) {
            self.recover();
            tx.report.outcome = Outcome::Failed;
            tx.report.message = format!("Sync failed: {e}");
            tx.report.error_detail = Some(e.to_string());
        }
        tx.enter(Phase::Done);

        let report = tx.report;
        match report.outcome {
            Outcome::Failed => tracing::warn!(
                kind = ?kind,
                error = report.error_detail.as_deref().unwrap_or_default(),
                "Sync failed"
            ),
            Outcome::ConflictAutoResolved => tracing::warn!(
                kind = ?kind,
                paths = ?report.conflicted_paths,
                discarded = ?report.discarded_local_changes,
                "Sync resolved conflicts by keeping the remote version"
            ),
            outcome => tracing::info!(
                kind = ?kind,
                outcome = ?outcome,
                commit = report.commit.as_deref().unwrap_or_default(),
                received = report.commits_received,
                pushed = report.pushed,
                "Sync finished"
            ),
        }
        report
    }

    /// Leave no half-finished rebase behind after a failure.
    fn recover(&self) {
        match self.vcs.abort_in_progress() {
            Ok(true) => tracing::warn!("Aborted in-progress operation after failure"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "Failed to abort in-progress operation"),
        }
    }

    fn execute(&self, tx: &mut Transaction) -> Result<()> {
        let plan = tx.report.kind.plan();

        if self.vcs.abort_in_progress()? {
            tracing::warn!("Aborted an operation left in progress by an earlier run");
        }

        let inspector = Inspector::new(self.vcs, &self.config.repository);
        let identity = inspector.verify_identity();
        if !identity.is_ok() {
            return Err(Error::Identity {
                errors: identity.errors,
            });
        }

        let status = inspector.inspect()?;

        if !plan.commit_local {
            if status.commits_behind == 0 {
                tx.report.skip(Outcome::SkippedNoOp, "Already up to date");
                return Ok(());
            }
            let overlap = self.overlapping_local_edits(&status.working_tree_files)?;
            if !overlap.is_empty() {
                tx.report.skip(
                    Outcome::SkippedUncommittedConflict,
                    format!(
                        "Uncommitted local changes overlap incoming changes: {}",
                        overlap.join(", ")
                    ),
                );
                tx.report.conflicted_paths = overlap;
                return Ok(());
            }
        } else if !status.working_tree_files.is_empty() {
            tx.enter(Phase::Committing);
            self.commit_local(tx)?;
        }

        let divergence = self.vcs.divergence()?;
        if divergence.ahead == 0 && (divergence.behind == 0 || !plan.force_remote_check) {
            tx.report.skip(Outcome::SkippedNoOp, "Nothing to sync");
            return Ok(());
        }

        tx.enter(Phase::Pulling);
        if divergence.behind > 0 {
            self.pull(tx, &divergence)?;
        }

        if plan.push && self.vcs.divergence()?.ahead > 0 {
            tx.enter(Phase::Pushing);
            self.vcs.push()?;
            tx.report.pushed = true;
        }

        tx.report.outcome = if tx.report.conflicted_paths.is_empty() {
            Outcome::Success
        } else {
            Outcome::ConflictAutoResolved
        };
        tx.report.message = self.success_message(&tx.report);
        Ok(())
    }

    /// Uncommitted paths that incoming commits also touch.
    fn overlapping_local_edits(&self, local: &[FileChange]) -> Result<Vec<String>> {
        let local_paths: BTreeSet<&str> = local.iter().flat_map(change_paths).collect();
        let incoming = self.vcs.diff(&Revision::MergeBase, &Revision::Upstream)?;
        let overlap: BTreeSet<String> = incoming
            .iter()
            .flat_map(change_paths)
            .filter(|path| local_paths.contains(path))
            .map(str::to_string)
            .collect();
        Ok(overlap.into_iter().collect())
    }

    /// Stage everything, drop assets that fail validation, commit the rest.
    fn commit_local(&self, tx: &mut Transaction) -> Result<()> {
        self.vcs.stage_all()?;

        let mut dropped = false;
        for change in self.vcs.diff(&Revision::Head, &Revision::Index)? {
            let is_new = matches!(change.kind, ChangeKind::Added | ChangeKind::Renamed);
            if !is_new || !self.summarizer.is_asset_path(&change.path) {
                continue;
            }
            if let ValidationResult::Fail(reason) =
                self.validator.validate(&self.vcs.workdir().join(&change.path))
            {
                tracing::warn!(path = %change.path, reason = %reason, "Dropping invalid asset from commit");
                self.vcs.unstage(&change.path)?;
                tx.report.validation_errors.push(ValidationFailure {
                    path: change.path,
                    reason,
                });
                dropped = true;
            }
        }

        if !self.vcs.has_staged_changes()? {
            tracing::debug!(dropped, "Nothing left to commit");
            return Ok(());
        }

        let staged = self.vcs.diff(&Revision::Head, &Revision::Index)?;
        let upload = self.summarizer.summarize_for_upload(
            &self.document_at(&Revision::Head)?,
            &self.document_at(&Revision::Index)?,
            &staged,
        );
        let message = upload.commit_message(self.config.commit.max_detail_lines);
        let hash = self.vcs.commit(&message)?;
        tracing::info!(commit = %hash, summary = %upload.aggregate(), "Committed local changes");

        tx.report.commit = Some(hash);
        tx.report.upload = upload;
        Ok(())
    }

    /// Remote changes between the common base and the tracking branch.
    fn incoming_summary(&self) -> Result<DownloadSummary> {
        let files = self.vcs.diff(&Revision::MergeBase, &Revision::Upstream)?;
        Ok(self.summarizer.summarize_for_download(
            &self.document_at(&Revision::MergeBase)?,
            &self.document_at(&Revision::Upstream)?,
            &files,
        ))
    }

    fn pull(&self, tx: &mut Transaction, before: &Divergence) -> Result<()> {
        let local = LocalSide {
            base: self.vcs.resolve(&Revision::MergeBase)?,
            head: self.vcs.resolve(&Revision::Head)?,
        };
        tx.report.download = self.incoming_summary()?;

        match self.vcs.pull_rebase(true)? {
            PullOutcome::UpToDate => return Ok(()),
            PullOutcome::FastForwarded { commits } | PullOutcome::Rebased { commits } => {
                tx.report.commits_received = commits;
            }
            PullOutcome::Conflicted { paths } => {
                tx.enter(Phase::ConflictDetected);
                tracing::warn!(paths = ?paths, "Pull stopped on conflicts");

                tx.enter(Phase::Resolving);
                let resolution = ConflictResolver::new(self.vcs, &self.summarizer)
                    .resolve(&paths, &local)?;
                tx.report.conflicted_paths = resolution.resolved_paths;
                tx.report.discarded_local_changes = resolution.discarded_local_changes;

                tx.enter(Phase::Pulling);
                if let PullOutcome::Conflicted { paths } = self.vcs.pull_rebase(true)? {
                    self.vcs.abort_in_progress()?;
                    return Err(Error::UnresolvedConflict { paths });
                }
                tx.report.commits_received = before.behind;
                if tx.report.commit.is_some() {
                    self.restate_local_commit(tx, before.ahead)?;
                }
            }
        }
        tx.report.pulled_changes = true;
        Ok(())
    }

    /// After conflicts were resolved against it, the commit made for local
    /// changes holds only what survived, or was dropped when nothing did.
    /// Bring its message and the upload summary in line with that.
    fn restate_local_commit(&self, tx: &mut Transaction, ahead_before: usize) -> Result<()> {
        let original = tx
            .report
            .upload
            .commit_message(self.config.commit.max_detail_lines);
        let subject = original.lines().next().unwrap_or_default();
        let ahead = self.vcs.divergence()?.ahead;
        // rebase only drops commits; ours was the last one replayed
        let survived = ahead > 0
            && (ahead == ahead_before
                || self
                    .vcs
                    .last_commit()?
                    .is_some_and(|commit| commit.message == subject));

        if !survived {
            tracing::warn!("Local commit was dropped entirely in favour of the remote");
            tx.report.commit = None;
            tx.report.upload = UploadSummary::default();
            return Ok(());
        }

        let parent = Revision::Commit("HEAD~1".to_string());
        let files = self.vcs.diff(&parent, &Revision::Head)?;
        let upload = self.summarizer.summarize_for_upload(
            &self.document_at(&parent)?,
            &self.document_at(&Revision::Head)?,
            &files,
        );
        if upload != tx.report.upload {
            let message = upload.commit_message(self.config.commit.max_detail_lines);
            let hash = self.vcs.reword_head(&message)?;
            tracing::info!(commit = %hash, summary = %upload.aggregate(), "Reworded local commit after conflict");
            tx.report.commit = Some(hash);
            tx.report.upload = upload;
        } else {
            // replayed onto the remote, so the hash changed anyway
            tx.report.commit = self.vcs.last_commit()?.map(|commit| commit.hash);
        }
        Ok(())
    }

    fn document_at(&self, rev: &Revision) -> Result<MetadataDocument> {
        let bytes = self
            .vcs
            .read_file(rev, self.summarizer.metadata_file())?;
        Ok(MetadataDocument::from_optional(bytes.as_deref())?)
    }

    fn success_message(&self, report: &TransactionReport) -> String {
        let mut parts = Vec::new();
        if report.commit.is_some() && report.pushed {
            parts.push(format!("uploaded {}", describe_counts(&report.upload)));
        } else if report.pushed {
            parts.push("pushed local commits".to_string());
        }
        if report.pulled_changes {
            parts.push(format!(
                "received {} commit{}",
                report.commits_received,
                plural(report.commits_received)
            ));
        }
        if !report.conflicted_paths.is_empty() {
            parts.push(format!(
                "resolved {} conflicting path{} by keeping the remote version",
                report.conflicted_paths.len(),
                plural(report.conflicted_paths.len())
            ));
        }
        if parts.is_empty() {
            return "Sync complete".to_string();
        }
        let mut message = parts.join(", ");
        if let Some(first) = message.get(..1) {
            message = format!("{}{}", first.to_uppercase(), &message[1..]);
        }
        message
    }
}

fn change_paths(change: &FileChange) -> impl Iterator<Item = &str> {
    std::iter::once(change.path.as_str()).chain(change.previous_path.as_deref())
}

fn describe_counts(summary: &UploadSummary) -> String {
    let aggregate = summary.aggregate();
    if aggregate.is_empty() {
        "metadata changes".to_string()
    } else {
        aggregate
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
