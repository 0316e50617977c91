//! Router for the sync endpoints

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use gallery_sync::SyncService;

use crate::handlers::{
    check_handler, full_sync_handler, git_status_handler, logs_handler, status_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
}

impl AppState {
    pub fn new(service: SyncService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Create the sync router.
///
/// Provides:
/// - GET /sync/status - what a sync would upload and download
/// - GET /sync/check - fetch and pull only
/// - POST /sync/full - commit, pull and push
/// - GET /sync/logs - recent attempts, newest first
/// - GET /sync/git-status - raw repository state
pub fn sync_router(state: AppState) -> Router {
    Router::new()
        .route("/sync/status", get(status_handler))
        .route("/sync/check", get(check_handler))
        .route("/sync/full", post(full_sync_handler))
        .route("/sync/logs", get(logs_handler))
        .route("/sync/git-status", get(git_status_handler))
        .with_state(state)
}
