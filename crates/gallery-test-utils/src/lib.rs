//! Shared test utilities for the gallery sync workspace.
//!
//! Dev-dependency only. Fixtures drive the real `git` binary so tests see the
//! same repository states the engine sees in production.
//!
//! # Modules
//!
//! - [`git`]: thin wrappers around the `git` CLI and file helpers
//! - [`remote`]: [`RemoteFixture`], a bare remote with any number of clones

pub mod git;
pub mod remote;

pub use git::{git, read_file, remove_file, write_file};
pub use remote::RemoteFixture;
