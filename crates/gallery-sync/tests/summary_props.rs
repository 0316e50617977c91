//! Properties of change summaries

use gallery_git::{ChangeKind, FileChange};
use gallery_meta::{AssetRecord, MetadataDocument};
use gallery_sync::Summarizer;
use proptest::prelude::*;

fn asset_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.jpg"
}

proptest! {
    #[test]
    fn rename_is_one_item(
        old in asset_name(),
        new in asset_name(),
        tags_before in prop::collection::btree_set("[a-z]{1,5}", 0..4),
        tags_after in prop::collection::btree_set("[a-z]{1,5}", 0..4),
        move_metadata in any::<bool>(),
    ) {
        prop_assume!(old != new);

        let mut prior = MetadataDocument::new();
        prior.insert(old.clone(), AssetRecord { tags: tags_before, ..Default::default() });
        let mut current = MetadataDocument::new();
        let key = if move_metadata { new.clone() } else { old.clone() };
        current.insert(key, AssetRecord { tags: tags_after, ..Default::default() });

        let summary = Summarizer::new("metadata.json").summarize_for_upload(
            &prior,
            &current,
            &[FileChange::renamed(old.clone(), new.clone())],
        );

        prop_assert_eq!(summary.renamed_assets, 1);
        prop_assert_eq!(summary.total(), 1);
        prop_assert_eq!(summary.items.len(), 1);
        let expected_prefix = format!("renamed: {old} -> {new}");
        prop_assert!(summary.items[0].starts_with(&expected_prefix));
    }

    #[test]
    fn counts_match_items(
        added in prop::collection::btree_set(asset_name(), 0..5),
        deleted in prop::collection::btree_set("[a-z]{1,8}\\.png", 0..5),
    ) {
        let files: Vec<FileChange> = added
            .iter()
            .map(|p| FileChange::new(p.clone(), ChangeKind::Added))
            .chain(deleted.iter().map(|p| FileChange::new(p.clone(), ChangeKind::Deleted)))
            .collect();
        let empty = MetadataDocument::new();
        let summary = Summarizer::new("metadata.json").summarize_for_download(&empty, &empty, &files);

        prop_assert_eq!(summary.new_assets, added.len());
        prop_assert_eq!(summary.deleted_assets, deleted.len());
        prop_assert_eq!(summary.items.len(), summary.total());
    }
}
