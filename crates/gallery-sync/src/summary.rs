//! Domain-level change summaries
//!
//! Raw VCS statuses and the metadata document diff are folded into one line
//! per affected asset, e.g.
//!
//! ```text
//! Sync: 1 new, 1 renamed, 1 modified
//!
//!   added: photos/cat.jpg
//!   photos/sea.jpg: added tags: blue, calm; changed: rating
//!   renamed: photos/a.jpg -> photos/b.jpg; removed tag: draft
//! ```

use std::collections::{BTreeMap, BTreeSet};

use gallery_git::{ChangeKind, FileChange};
use gallery_meta::{MetadataDocument, RecordChanges};
use serde::{Deserialize, Serialize};

/// Counts and per-asset lines describing one direction of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub new_assets: usize,
    pub modified_assets: usize,
    pub deleted_assets: usize,
    pub renamed_assets: usize,
    pub items: Vec<String>,
}

/// Local changes going to the remote
pub type UploadSummary = ChangeSummary;

/// Remote changes coming into the working tree
pub type DownloadSummary = ChangeSummary;

/// Both directions of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub upload: UploadSummary,
    pub download: DownloadSummary,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upload.is_empty() && self.download.is_empty()
    }
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.new_assets + self.modified_assets + self.deleted_assets + self.renamed_assets
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.items.is_empty()
    }

    /// Count line in fixed order: new, renamed, modified, deleted.
    pub fn aggregate(&self) -> String {
        [
            (self.new_assets, "new"),
            (self.renamed_assets, "renamed"),
            (self.modified_assets, "modified"),
            (self.deleted_assets, "deleted"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Commit message: aggregate subject, then one indented line per asset,
    /// listing at most `max_detail_lines` of them.
    pub fn commit_message(&self, max_detail_lines: usize) -> String {
        let subject = if self.total() == 0 {
            "Sync: update metadata".to_string()
        } else {
            format!("Sync: {}", self.aggregate())
        };
        if self.items.is_empty() {
            return subject;
        }

        let mut lines: Vec<String> = self
            .items
            .iter()
            .take(max_detail_lines)
            .map(|item| format!("  {item}"))
            .collect();
        let hidden = self.items.len().saturating_sub(max_detail_lines);
        if hidden > 0 {
            lines.push(format!("  ... and {hidden} more"));
        }
        format!("{subject}\n\n{}", lines.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    New,
    Renamed,
    Modified,
    Deleted,
}

#[derive(Debug)]
struct Entry {
    class: Class,
    previous: Option<String>,
    facts: Vec<String>,
}

impl Entry {
    fn new(class: Class) -> Self {
        Self {
            class,
            previous: None,
            facts: Vec::new(),
        }
    }
}

fn labelled(singular: &str, plural: &str, values: &[String]) -> Option<String> {
    match values {
        [] => None,
        [one] => Some(format!("{singular}: {one}")),
        many => Some(format!("{plural}: {}", many.join(", "))),
    }
}

fn describe(changes: &RecordChanges) -> Vec<String> {
    [
        labelled("added tag", "added tags", &changes.added_tags),
        labelled("removed tag", "removed tags", &changes.removed_tags),
        (!changes.changed_properties.is_empty())
            .then(|| format!("changed: {}", changes.changed_properties.join(", "))),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Builds [`ChangeSummary`] values for one collection layout.
#[derive(Debug, Clone)]
pub struct Summarizer {
    metadata_file: String,
}

impl Summarizer {
    pub fn new(metadata_file: impl Into<String>) -> Self {
        Self {
            metadata_file: metadata_file.into(),
        }
    }

    pub fn metadata_file(&self) -> &str {
        &self.metadata_file
    }

    /// Whether `path` is an asset: not the metadata document, not a dotfile.
    pub fn is_asset_path(&self, path: &str) -> bool {
        path != self.metadata_file && !path.split('/').any(|part| part.starts_with('.'))
    }

    /// Summarize local changes from `prior` (last shared state) to `current`.
    pub fn summarize_for_upload(
        &self,
        prior: &MetadataDocument,
        current: &MetadataDocument,
        files: &[FileChange],
    ) -> UploadSummary {
        self.summarize(prior, current, files)
    }

    /// Summarize incoming changes from `prior` (last shared state) to the
    /// remote's `current`.
    pub fn summarize_for_download(
        &self,
        prior: &MetadataDocument,
        current: &MetadataDocument,
        files: &[FileChange],
    ) -> DownloadSummary {
        self.summarize(prior, current, files)
    }

    fn summarize(
        &self,
        prior: &MetadataDocument,
        current: &MetadataDocument,
        files: &[FileChange],
    ) -> ChangeSummary {
        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();

        for change in files.iter().filter(|c| self.is_asset_path(&c.path)) {
            let entry = match (change.kind, &change.previous_path) {
                (ChangeKind::Renamed, Some(previous)) => Entry {
                    previous: Some(previous.clone()),
                    ..Entry::new(Class::Renamed)
                },
                (ChangeKind::Added, _) => Entry::new(Class::New),
                (ChangeKind::Deleted, _) => Entry::new(Class::Deleted),
                (ChangeKind::Modified | ChangeKind::Conflicted | ChangeKind::Renamed, _) => {
                    Entry::new(Class::Modified)
                }
            };
            entries.insert(change.path.clone(), entry);
        }

        // A renamed asset's metadata may sit under either path on either side;
        // whatever changed is reported on the rename's single line.
        let mut consumed: BTreeSet<String> = BTreeSet::new();
        for (path, entry) in entries.iter_mut() {
            let Some(previous) = entry.previous.clone() else {
                continue;
            };
            let before = prior.get(&previous).or_else(|| prior.get(path));
            let after = current.get(path).or_else(|| current.get(&previous));
            if let (Some(old), Some(new)) = (before, after) {
                entry.facts = describe(&old.changes_to(new));
            }
            consumed.insert(previous);
            consumed.insert(path.clone());
        }

        let ids: BTreeSet<&str> = prior.ids().chain(current.ids()).collect();
        for id in ids.into_iter().filter(|id| !consumed.contains(*id)) {
            match (prior.get(id), current.get(id)) {
                (Some(old), Some(new)) => {
                    let facts = describe(&old.changes_to(new));
                    if facts.is_empty() {
                        continue;
                    }
                    entries
                        .entry(id.to_string())
                        .or_insert_with(|| Entry::new(Class::Modified))
                        .facts
                        .extend(facts);
                }
                (None, Some(_)) => {
                    entries
                        .entry(id.to_string())
                        .or_insert_with(|| Entry::new(Class::New));
                }
                (Some(_), None) => {
                    entries
                        .entry(id.to_string())
                        .or_insert_with(|| Entry::new(Class::Deleted));
                }
                (None, None) => {}
            }
        }

        let mut summary = ChangeSummary::default();
        for (id, entry) in entries {
            let item = match entry.class {
                Class::New => {
                    summary.new_assets += 1;
                    format!("added: {id}")
                }
                Class::Deleted => {
                    summary.deleted_assets += 1;
                    format!("deleted: {id}")
                }
                Class::Renamed => {
                    summary.renamed_assets += 1;
                    let previous = entry.previous.unwrap_or_default();
                    if entry.facts.is_empty() {
                        format!("renamed: {previous} -> {id}")
                    } else {
                        format!("renamed: {previous} -> {id}; {}", entry.facts.join("; "))
                    }
                }
                Class::Modified => {
                    summary.modified_assets += 1;
                    if entry.facts.is_empty() {
                        format!("modified: {id}")
                    } else {
                        format!("{id}: {}", entry.facts.join("; "))
                    }
                }
            };
            summary.items.push(item);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_meta::AssetRecord;
    use pretty_assertions::assert_eq;

    fn doc(json: &str) -> MetadataDocument {
        MetadataDocument::from_json_str(json).unwrap()
    }

    fn summarizer() -> Summarizer {
        Summarizer::new("metadata.json")
    }

    #[test]
    fn test_removed_tag() {
        let summary = summarizer().summarize_for_upload(
            &doc(r#"{"x.jpg": {"tags": ["a", "b"]}}"#),
            &doc(r#"{"x.jpg": {"tags": ["a"]}}"#),
            &[FileChange::new("metadata.json", ChangeKind::Modified)],
        );
        assert_eq!(summary.modified_assets, 1);
        assert_eq!(summary.items, vec!["x.jpg: removed tag: b"]);
    }

    #[test]
    fn test_new_files_without_metadata() {
        let files = [
            FileChange::new("c.jpg", ChangeKind::Added),
            FileChange::new("a.jpg", ChangeKind::Added),
            FileChange::new("b.jpg", ChangeKind::Added),
        ];
        let empty = MetadataDocument::new();
        let summary = summarizer().summarize_for_upload(&empty, &empty, &files);
        assert_eq!(summary.new_assets, 3);
        assert_eq!(summary.items, vec!["added: a.jpg", "added: b.jpg", "added: c.jpg"]);
        assert!(summary.commit_message(50).starts_with("Sync: 3 new"));
    }

    #[test]
    fn test_new_file_with_metadata_counted_once() {
        let summary = summarizer().summarize_for_upload(
            &MetadataDocument::new(),
            &doc(r#"{"n.jpg": {"tags": ["x"]}}"#),
            &[FileChange::new("n.jpg", ChangeKind::Added)],
        );
        assert_eq!(summary.new_assets, 1);
        assert_eq!(summary.items, vec!["added: n.jpg"]);
    }

    #[test]
    fn test_rename_with_tag_change_is_one_line() {
        let summary = summarizer().summarize_for_upload(
            &doc(r#"{"old.jpg": {"tags": ["draft"], "rating": 2}}"#),
            &doc(r#"{"new.jpg": {"tags": ["final"], "rating": 2}}"#),
            &[FileChange::renamed("old.jpg", "new.jpg")],
        );
        assert_eq!(summary.renamed_assets, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(
            summary.items,
            vec!["renamed: old.jpg -> new.jpg; added tag: final; removed tag: draft"]
        );
    }

    #[test]
    fn test_document_only_additions_and_deletions() {
        let summary = summarizer().summarize_for_download(
            &doc(r#"{"gone.jpg": {}, "kept.jpg": {"tags": ["a"]}}"#),
            &doc(r#"{"kept.jpg": {"tags": ["a", "b", "c"], "title": "t"}, "fresh.jpg": {}}"#),
            &[],
        );
        assert_eq!(
            summary.items,
            vec![
                "added: fresh.jpg",
                "deleted: gone.jpg",
                "kept.jpg: added tags: b, c; changed: title",
            ]
        );
        assert_eq!(summary.aggregate(), "1 new, 1 modified, 1 deleted");
    }

    #[test]
    fn test_file_only_modification_and_ignored_paths() {
        let summary = summarizer().summarize_for_upload(
            &MetadataDocument::new(),
            &MetadataDocument::new(),
            &[
                FileChange::new("photo.jpg", ChangeKind::Modified),
                FileChange::new(".gitattributes", ChangeKind::Modified),
                FileChange::new("thumbs/.cache/x.jpg", ChangeKind::Added),
                FileChange::new("metadata.json", ChangeKind::Modified),
            ],
        );
        assert_eq!(summary.items, vec!["modified: photo.jpg"]);
    }

    #[test]
    fn test_commit_message_caps_detail_lines() {
        let summary = ChangeSummary {
            new_assets: 4,
            items: (1..=4).map(|i| format!("added: {i}.jpg")).collect(),
            ..Default::default()
        };
        assert_eq!(
            summary.commit_message(2),
            "Sync: 4 new\n\n  added: 1.jpg\n  added: 2.jpg\n  ... and 2 more"
        );
    }

    #[test]
    fn test_metadata_only_commit_subject() {
        let summary = ChangeSummary::default();
        assert_eq!(summary.commit_message(50), "Sync: update metadata");
        assert!(summary.is_empty());
    }

    #[test]
    fn test_property_values_are_not_reported() {
        let mut before = MetadataDocument::new();
        before.insert("p.jpg", AssetRecord::default());
        let after = doc(r#"{"p.jpg": {"tags": [], "caption": "secret text"}}"#);
        let summary = summarizer().summarize_for_upload(&before, &after, &[]);
        assert_eq!(summary.items, vec!["p.jpg: changed: caption"]);
    }
}
