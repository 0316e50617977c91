//! HTTP error mapping for the sync endpoints

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The guard is held by another transaction
    #[error("Sync already in progress")]
    SyncInProgress,

    /// A transaction ran and ended in the failed outcome
    #[error("{message}")]
    SyncFailed { message: String },

    #[error(transparent)]
    Sync(#[from] gallery_sync::Error),

    /// The blocking worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::SyncInProgress => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "syncInProgress": true,
                    "message": self.to_string(),
                }),
            ),
            ApiError::SyncFailed { .. } | ApiError::Sync(_) | ApiError::Task(_) => {
                tracing::error!(error = %self, "Sync request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": self.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
