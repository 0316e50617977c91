//! Sync engine for a git-backed media collection
//!
//! Keeps a local working copy (asset files plus one metadata document)
//! consistent with a remote repository while several triggers (startup check,
//! page-load check, manual sync, post-upload hook) compete for it.
//!
//! # Architecture
//!
//! ```text
//!                  SyncService
//!                       |
//!        ConcurrencyGuard ---- SyncLog
//!                       |
//!                  Coordinator            StatusProjector
//!                 /     |     \              /      \
//!        Inspector  Summarizer  ConflictResolver   (Inspector + Summarizer)
//!                       |
//!            gallery-git / gallery-meta
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod inspector;
pub mod log;
pub mod projector;
pub mod resolver;
pub mod service;
pub mod summary;

pub use config::SyncConfig;
pub use coordinator::{
    Coordinator, OperationKind, Outcome, Phase, TransactionPlan, TransactionReport,
    ValidationFailure,
};
pub use error::{Error, Result};
pub use guard::{ConcurrencyGuard, SyncPermit};
pub use inspector::{IdentityReport, Inspector, RepositoryStatus};
pub use log::{SyncAttempt, SyncLog};
pub use projector::{StatusProjector, SyncStatusView};
pub use resolver::{ConflictResolver, LocalSide, Resolution};
pub use service::{SyncRun, SyncService};
pub use summary::{ChangeSet, ChangeSummary, DownloadSummary, Summarizer, UploadSummary};
