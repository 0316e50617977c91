//! Read-only "what would a sync do" view
//!
//! Projection never commits, pulls or pushes and never takes the guard, so it
//! can run while a transaction is in flight. It fetches first unless told not
//! to.

use gallery_git::{Revision, VcsClient};
use gallery_meta::{MetadataDocument, MetadataStore};
use serde::Serialize;

use crate::Result;
use crate::config::RepositorySection;
use crate::inspector::Inspector;
use crate::summary::{DownloadSummary, Summarizer, UploadSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub has_changes: bool,
    pub upload: UploadSummary,
    pub download: DownloadSummary,
}

pub struct StatusProjector<'a> {
    vcs: &'a dyn VcsClient,
    store: &'a dyn MetadataStore,
    repository: &'a RepositorySection,
    summarizer: Summarizer,
    fetch: bool,
}

impl<'a> StatusProjector<'a> {
    pub fn new(
        vcs: &'a dyn VcsClient,
        store: &'a dyn MetadataStore,
        repository: &'a RepositorySection,
    ) -> Self {
        Self {
            vcs,
            store,
            repository,
            summarizer: Summarizer::new(repository.metadata_file.clone()),
            fetch: true,
        }
    }

    /// Project from the remote-tracking refs as last fetched.
    pub fn without_fetch(mut self) -> Self {
        self.fetch = false;
        self
    }

    pub fn project(&self) -> Result<SyncStatusView> {
        let inspector = Inspector::new(self.vcs, self.repository);
        let inspector = if self.fetch {
            inspector
        } else {
            inspector.without_fetch()
        };
        let divergence = inspector.divergence()?;
        let base_doc = self.document_at(&Revision::MergeBase)?;

        // Everything local that the remote does not have yet, committed or not.
        let local_files = self.vcs.diff(&Revision::MergeBase, &Revision::WorkingTree)?;
        let upload = self.summarizer.summarize_for_upload(
            &base_doc,
            &self.store.read()?,
            &local_files,
        );

        let download = if divergence.behind > 0 {
            let remote_files = self.vcs.diff(&Revision::MergeBase, &Revision::Upstream)?;
            self.summarizer.summarize_for_download(
                &base_doc,
                &self.document_at(&Revision::Upstream)?,
                &remote_files,
            )
        } else {
            DownloadSummary::default()
        };

        Ok(SyncStatusView {
            has_changes: divergence.ahead > 0
                || divergence.behind > 0
                || !upload.is_empty()
                || !download.is_empty(),
            upload,
            download,
        })
    }

    fn document_at(&self, rev: &Revision) -> Result<MetadataDocument> {
        let bytes = self
            .vcs
            .read_file(rev, self.summarizer.metadata_file())?;
        Ok(MetadataDocument::from_optional(bytes.as_deref())?)
    }
}
