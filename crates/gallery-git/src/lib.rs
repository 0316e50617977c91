//! Version-control client for the gallery sync engine
//!
//! The sync engine only ever talks to the repository through [`VcsClient`].
//! [`GitClient`] is the production implementation: inspection goes through
//! `git2`, while anything that mutates the working tree or touches the network
//! shells out to the `git` binary so the large-asset extension's filters and
//! hooks take part.

pub mod client;
pub mod commits;
pub mod error;
pub mod repository;

mod command;

pub use client::{
    ChangeKind, Divergence, FileChange, LargeAssetSupport, PullOutcome, RebaseProgress, Revision,
    VcsClient,
};
pub use commits::CommitInfo;
pub use error::{Error, Result};
pub use repository::{CommitIdentity, GitClient};
