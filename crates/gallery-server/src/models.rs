//! Response bodies of the sync endpoints

use gallery_sync::{
    ChangeSummary, RepositoryStatus, SyncAttempt, SyncStatusView, TransactionReport,
    ValidationFailure,
};
use serde::Serialize;

fn joined(items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| items.join("\n"))
}

fn remote_summary(download: &ChangeSummary) -> Option<String> {
    joined(&download.items)
}

/// GET /sync/status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: SyncStatusView,
}

/// GET /sync/check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    pub pulled_changes: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_resolved_conflict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_changes_summary: Option<String>,
    pub commits_received: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_changes_summary: Option<String>,
}

impl From<&TransactionReport> for CheckResponse {
    fn from(report: &TransactionReport) -> Self {
        let resolved = report.auto_resolved_conflict();
        Self {
            success: report.outcome.is_success(),
            pulled_changes: report.pulled_changes,
            skipped: report.outcome.is_skipped(),
            reason: report.skip_reason.clone(),
            auto_resolved_conflict: resolved.then_some(true),
            lost_changes_summary: joined(&report.discarded_local_changes),
            commits_received: report.commits_received,
            remote_changes_summary: remote_summary(&report.download),
        }
    }
}

/// POST /sync/full
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_resolved_conflict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_changes_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_changes_summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationFailure>,
}

impl From<&TransactionReport> for FullSyncResponse {
    fn from(report: &TransactionReport) -> Self {
        Self {
            success: report.outcome.is_success(),
            message: report.message.clone(),
            auto_resolved_conflict: report.auto_resolved_conflict().then_some(true),
            lost_changes_summary: joined(&report.discarded_local_changes),
            remote_changes_summary: remote_summary(&report.download),
            validation_errors: report.validation_errors.clone(),
        }
    }
}

/// GET /sync/logs
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<SyncAttempt>,
}

/// GET /sync/git-status
#[derive(Debug, Serialize)]
pub struct GitStatusResponse {
    pub success: bool,
    pub status: RepositoryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries_are_newline_joined() {
        assert_eq!(joined(&[]), None);
        assert_eq!(
            joined(&["a.jpg: removed tag: x".into(), "added: b.jpg".into()]).as_deref(),
            Some("a.jpg: removed tag: x\nadded: b.jpg")
        );
    }
}
