//! Bounded audit trail of sync attempts
//!
//! The log is diagnostic only; the VCS history stays the source of truth.
//! When a file is configured the whole log is rewritten after each append,
//! merged with whatever other instances wrote to it in the meantime.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gallery_meta::write_atomic;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::coordinator::{OperationKind, Outcome, TransactionReport};
use crate::summary::ChangeSet;

/// Entries kept when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 100;

/// One recorded transaction. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttempt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation_kind: OperationKind,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_set: Option<ChangeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicted_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_local_changes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

fn non_empty(items: &[String]) -> Option<Vec<String>> {
    (!items.is_empty()).then(|| items.to_vec())
}

impl SyncAttempt {
    pub fn from_report(report: &TransactionReport) -> Self {
        let change_set = ChangeSet {
            upload: report.upload.clone(),
            download: report.download.clone(),
        };
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation_kind: report.kind,
            outcome: report.outcome,
            change_set: (!change_set.is_empty()).then_some(change_set),
            conflicted_paths: non_empty(&report.conflicted_paths),
            discarded_local_changes: non_empty(&report.discarded_local_changes),
            error_detail: report.error_detail.clone(),
        }
    }
}

fn read_entries(path: &Path) -> Result<Vec<SyncAttempt>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Fixed-capacity log; the oldest entry is evicted first.
#[derive(Debug)]
pub struct SyncLog {
    capacity: usize,
    entries: VecDeque<SyncAttempt>,
    file: Option<PathBuf>,
}

impl Default for SyncLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SyncLog {
    /// In-memory log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            file: None,
        }
    }

    /// Log persisted to `path`, loading existing entries from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut log = Self::new(capacity);
        log.merge(read_entries(&path)?);
        tracing::debug!(path = %path.display(), entries = log.len(), "Loaded sync log");
        log.file = Some(path);
        Ok(log)
    }

    fn push(&mut self, attempt: SyncAttempt) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(attempt);
    }

    /// Fold in entries this log has not seen, keeping timestamp order and the
    /// capacity bound.
    fn merge(&mut self, stored: Vec<SyncAttempt>) {
        let known: HashSet<Uuid> = self.entries.iter().map(|entry| entry.id).collect();
        let mut merged: Vec<SyncAttempt> = self.entries.drain(..).collect();
        merged.extend(stored.into_iter().filter(|entry| !known.contains(&entry.id)));
        merged.sort_by_key(|entry| entry.timestamp);
        for entry in merged {
            self.push(entry);
        }
    }

    /// Pick up entries other instances appended to the log file.
    ///
    /// Read failures are logged and leave the in-memory entries as they were.
    pub fn reload(&mut self) {
        let Some(path) = self.file.clone() else {
            return;
        };
        match read_entries(&path) {
            Ok(stored) => self.merge(stored),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to reload sync log")
            }
        }
    }

    /// Append an entry, persisting the log when it is file-backed.
    ///
    /// The file is re-read and merged before it is rewritten, so entries other
    /// instances appended survive. Callers hold the sync guard, which keeps
    /// the read and the rewrite from interleaving with another instance.
    ///
    /// A failed write is logged and otherwise ignored: the in-memory entry is
    /// kept and the transaction it describes has already happened.
    pub fn record(&mut self, attempt: SyncAttempt) {
        let Some(path) = self.file.clone() else {
            self.push(attempt);
            return;
        };

        self.reload();
        self.push(attempt);
        if let Err(e) = self.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist sync log");
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    /// Entries, newest first.
    pub fn newest_first(&self) -> Vec<SyncAttempt> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn attempt(kind: OperationKind, outcome: Outcome) -> SyncAttempt {
        SyncAttempt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation_kind: kind,
            outcome,
            change_set: None,
            conflicted_paths: None,
            discarded_local_changes: None,
            error_detail: None,
        }
    }

    #[test]
    fn test_newest_first_and_eviction() {
        let mut log = SyncLog::new(2);
        let first = attempt(OperationKind::Check, Outcome::SkippedNoOp);
        let second = attempt(OperationKind::ManualSync, Outcome::Success);
        let third = attempt(OperationKind::AutoPush, Outcome::Failed);
        log.record(first);
        log.record(second.clone());
        log.record(third.clone());

        assert_eq!(log.newest_first(), vec![third, second]);
    }

    #[test]
    fn test_persisted_log_survives_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logs/sync-log.json");
        let entry = attempt(OperationKind::ManualSync, Outcome::ConflictAutoResolved);

        let mut log = SyncLog::open(&path, 10).unwrap();
        log.record(entry.clone());

        let reopened = SyncLog::open(&path, 10).unwrap();
        assert_eq!(reopened.newest_first(), vec![entry]);
    }

    #[test]
    fn test_reopen_with_smaller_capacity_keeps_newest() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sync-log.json");
        let mut log = SyncLog::open(&path, 10).unwrap();
        for _ in 0..5 {
            log.record(attempt(OperationKind::Check, Outcome::SkippedNoOp));
        }
        let newest = log.newest_first()[0].clone();

        let reopened = SyncLog::open(&path, 2).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.newest_first()[0], newest);
    }

    #[test]
    fn test_instances_sharing_a_file_keep_each_others_entries() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sync-log.json");
        let mut first = SyncLog::open(&path, 10).unwrap();
        let mut second = SyncLog::open(&path, 10).unwrap();
        let from_first = attempt(OperationKind::Check, Outcome::SkippedNoOp);
        let from_second = attempt(OperationKind::ManualSync, Outcome::Success);

        first.record(from_first.clone());
        second.record(from_second.clone());

        let reopened = SyncLog::open(&path, 10).unwrap();
        assert_eq!(
            reopened.newest_first(),
            vec![from_second.clone(), from_first.clone()]
        );

        first.reload();
        assert_eq!(first.newest_first(), vec![from_second, from_first]);
    }

    #[test]
    fn test_merged_log_respects_capacity() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sync-log.json");
        let mut first = SyncLog::open(&path, 2).unwrap();
        let mut second = SyncLog::open(&path, 2).unwrap();
        first.record(attempt(OperationKind::Check, Outcome::SkippedNoOp));
        first.record(attempt(OperationKind::Check, Outcome::SkippedNoOp));
        let newest = attempt(OperationKind::AutoPush, Outcome::Success);

        second.record(newest.clone());

        let reopened = SyncLog::open(&path, 10).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.newest_first()[0], newest);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(attempt(OperationKind::Check, Outcome::Success)).unwrap();
        assert_eq!(json["operationKind"], "check");
        assert!(json.get("errorDetail").is_none());
        assert!(json.get("changeSet").is_none());
    }

    proptest! {
        #[test]
        fn log_never_exceeds_capacity(capacity in 1usize..20, appends in 0usize..60) {
            let mut log = SyncLog::new(capacity);
            for _ in 0..appends {
                log.record(attempt(OperationKind::Check, Outcome::SkippedNoOp));
            }
            prop_assert_eq!(log.len(), appends.min(capacity));
        }
    }
}
