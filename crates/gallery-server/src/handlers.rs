//! Sync endpoint handlers
//!
//! Every engine call blocks on git and the filesystem, so it runs on the
//! blocking pool.

use std::sync::Arc;

use axum::{Json, extract::State};
use gallery_sync::{Outcome, SyncRun, SyncService, TransactionReport};

use crate::error::{ApiError, Result};
use crate::models::{
    CheckResponse, FullSyncResponse, GitStatusResponse, LogsResponse, StatusResponse,
};
use crate::router::AppState;

async fn blocking<T, F>(service: Arc<SyncService>, work: F) -> Result<T>
where
    F: FnOnce(&SyncService) -> gallery_sync::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let value = tokio::task::spawn_blocking(move || work(&service)).await??;
    Ok(value)
}

fn completed(run: SyncRun) -> Result<TransactionReport> {
    let SyncRun::Completed(report) = run else {
        return Err(ApiError::SyncInProgress);
    };
    if report.outcome == Outcome::Failed {
        return Err(ApiError::SyncFailed {
            message: report.error_detail.unwrap_or(report.message),
        });
    }
    Ok(report)
}

/// GET /sync/status
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let status = blocking(state.service, |service| service.status()).await?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}

/// GET /sync/check
pub async fn check_handler(State(state): State<AppState>) -> Result<Json<CheckResponse>> {
    let report = completed(blocking(state.service, |service| service.check()).await?)?;
    Ok(Json(CheckResponse::from(&report)))
}

/// POST /sync/full
pub async fn full_sync_handler(State(state): State<AppState>) -> Result<Json<FullSyncResponse>> {
    let report = completed(blocking(state.service, |service| service.full_sync()).await?)?;
    Ok(Json(FullSyncResponse::from(&report)))
}

/// GET /sync/logs
pub async fn logs_handler(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        success: true,
        logs: state.service.logs(),
    })
}

/// GET /sync/git-status
pub async fn git_status_handler(State(state): State<AppState>) -> Result<Json<GitStatusResponse>> {
    let status = blocking(state.service, |service| service.git_status()).await?;
    Ok(Json(GitStatusResponse {
        success: true,
        status,
    }))
}
