//! Gallery sync daemon
//!
//! # Usage
//!
//! ```bash
//! gallery-sync [--config <path>] [--repo <path>] [--verbose]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Control log verbosity (default: `info`)

use std::path::{Path, PathBuf};

use clap::Parser;
use gallery_server::{AppState, logging, sync_router};
use gallery_sync::config::DEFAULT_CONFIG_FILE;
use gallery_sync::{SyncConfig, SyncRun, SyncService};

/// Keep a media collection in sync with its remote repository
#[derive(Parser)]
#[command(name = "gallery-sync")]
#[command(version)]
struct Args {
    /// Config file (default: gallery-sync.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working tree to sync, overriding `repository.path`
    #[arg(short, long)]
    repo: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> gallery_sync::Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            SyncConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => {
            tracing::info!("No {DEFAULT_CONFIG_FILE} found, using defaults");
            SyncConfig::default()
        }
    };
    if let Some(repo) = &args.repo {
        config.repository.path = repo.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let config = load_config(&args)?;
    let bind = config.server.bind.clone();
    let check_on_startup = config.server.check_on_startup;

    let service = SyncService::open(config)?;
    let report = service.verify();
    if !report.is_ok() {
        tracing::warn!(errors = ?report.errors, "Repository identity check failed");
    }

    let state = AppState::new(service);
    if check_on_startup {
        let service = state.service.clone();
        tokio::task::spawn_blocking(move || match service.check() {
            Ok(SyncRun::Completed(report)) => tracing::info!(
                outcome = ?report.outcome,
                commits_received = report.commits_received,
                "Startup check finished"
            ),
            Ok(SyncRun::Busy) => tracing::info!("Startup check skipped, sync already in progress"),
            Err(e) => tracing::warn!(error = %e, "Startup check failed"),
        });
    }

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Serving sync endpoints");
    axum::serve(listener, sync_router(state)).await?;

    Ok(())
}
