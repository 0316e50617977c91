//! HTTP surface of the gallery sync engine
//!
//! The sync endpoints share one [`SyncService`](gallery_sync::SyncService);
//! contention on its guard is reported as `409` with `syncInProgress: true`.

pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod router;

pub use error::{ApiError, Result};
pub use router::{AppState, sync_router};
