//! Entry point shared by every sync trigger

use std::sync::{Arc, Mutex, MutexGuard};

use gallery_git::{GitClient, VcsClient};
use gallery_meta::{AssetValidator, JsonFileStore, MetadataStore};

use crate::Result;
use crate::config::SyncConfig;
use crate::coordinator::{Coordinator, OperationKind, TransactionReport};
use crate::guard::{ConcurrencyGuard, LOCK_FILE_NAME};
use crate::inspector::{IdentityReport, Inspector, RepositoryStatus};
use crate::log::{SyncAttempt, SyncLog};
use crate::projector::{StatusProjector, SyncStatusView};

/// Result of asking for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    /// Another transaction holds the guard; retry later
    Busy,
    Completed(TransactionReport),
}

impl SyncRun {
    pub fn report(&self) -> Option<&TransactionReport> {
        match self {
            Self::Busy => None,
            Self::Completed(report) => Some(report),
        }
    }
}

/// Owns the collaborators and serializes transactions through the guard.
pub struct SyncService {
    config: SyncConfig,
    vcs: Arc<dyn VcsClient>,
    store: Arc<dyn MetadataStore>,
    validator: Arc<dyn AssetValidator>,
    guard: ConcurrencyGuard,
    log: Mutex<SyncLog>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        vcs: Arc<dyn VcsClient>,
        store: Arc<dyn MetadataStore>,
        validator: Arc<dyn AssetValidator>,
    ) -> Self {
        let log = SyncLog::new(config.log.capacity);
        Self {
            config,
            vcs,
            store,
            validator,
            guard: ConcurrencyGuard::new(),
            log: Mutex::new(log),
        }
    }

    /// Build the production service for `config.repository.path`: git client,
    /// JSON metadata store, file validator, cross-process guard and, when
    /// configured, a persistent log.
    pub fn open(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let mut git = GitClient::open(
            &config.repository.path,
            config.repository.remote.clone(),
            config.repository.branch.clone(),
        )?;
        if let Some(identity) = config.identity() {
            git = git.with_identity(identity);
        }
        let lock_path = git.git_dir()?.join(LOCK_FILE_NAME);
        let log = match config.log_path() {
            Some(path) => SyncLog::open(path, config.log.capacity)?,
            None => SyncLog::new(config.log.capacity),
        };

        tracing::info!(
            repo = %git.workdir().display(),
            remote = %config.repository.remote,
            branch = %config.repository.branch,
            "Sync service ready"
        );

        Ok(Self {
            store: Arc::new(JsonFileStore::new(config.metadata_path())),
            validator: Arc::new(config.validator()),
            vcs: Arc::new(git),
            guard: ConcurrencyGuard::with_lock_file(lock_path),
            log: Mutex::new(log),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a transaction unless one is already running.
    pub fn run(&self, kind: OperationKind) -> Result<SyncRun> {
        let Some(_permit) = self.guard.try_acquire()? else {
            tracing::info!(kind = ?kind, "Sync already in progress");
            return Ok(SyncRun::Busy);
        };

        let report = Coordinator::new(self.vcs.as_ref(), self.validator.as_ref(), &self.config)
            .run(kind);
        // still under the permit, so no other instance is rewriting the log file
        self.log().record(SyncAttempt::from_report(&report));
        Ok(SyncRun::Completed(report))
    }

    /// User-initiated commit, pull and push.
    pub fn full_sync(&self) -> Result<SyncRun> {
        self.run(OperationKind::ManualSync)
    }

    /// Fetch and pull only.
    pub fn check(&self) -> Result<SyncRun> {
        self.run(OperationKind::Check)
    }

    /// Upload hook: commit and push local changes, silent when there are none.
    pub fn auto_push(&self) -> Result<SyncRun> {
        self.run(OperationKind::AutoPush)
    }

    /// What a sync would do right now. Never takes the guard; while a
    /// transaction runs, the remote-tracking refs it fetched are used as is.
    pub fn status(&self) -> Result<SyncStatusView> {
        let projector = StatusProjector::new(
            self.vcs.as_ref(),
            self.store.as_ref(),
            &self.config.repository,
        );
        if self.guard.is_busy() {
            projector.without_fetch().project()
        } else {
            projector.project()
        }
    }

    /// Raw repository state for diagnostics.
    pub fn git_status(&self) -> Result<RepositoryStatus> {
        let inspector = Inspector::new(self.vcs.as_ref(), &self.config.repository);
        if self.guard.is_busy() {
            inspector.without_fetch().inspect()
        } else {
            inspector.inspect()
        }
    }

    pub fn verify(&self) -> IdentityReport {
        Inspector::new(self.vcs.as_ref(), &self.config.repository).verify_identity()
    }

    /// Recorded attempts, newest first, including those persisted by other
    /// instances sharing the log file.
    pub fn logs(&self) -> Vec<SyncAttempt> {
        let mut log = self.log();
        log.reload();
        log.newest_first()
    }

    fn log(&self) -> MutexGuard<'_, SyncLog> {
        // entries are immutable once recorded, so a poisoned log is still consistent
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
