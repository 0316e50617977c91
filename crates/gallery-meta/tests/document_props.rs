//! Property tests for metadata comparison

use std::collections::BTreeSet;

use gallery_meta::{AssetRecord, MetadataDocument};
use proptest::prelude::*;
use serde_json::json;

fn tag_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 0..6)
}

proptest! {
    #[test]
    fn tag_order_and_duplicates_do_not_matter(tags in prop::collection::vec("[a-z]{1,4}", 0..8)) {
        let mut reversed = tags.clone();
        reversed.reverse();
        reversed.extend(tags.iter().take(2).cloned());

        let one = MetadataDocument::from_json_str(&json!({"a.jpg": {"tags": tags}}).to_string()).unwrap();
        let two = MetadataDocument::from_json_str(&json!({"a.jpg": {"tags": reversed}}).to_string()).unwrap();
        prop_assert_eq!(one, two);
    }

    #[test]
    fn changes_are_mirrored_in_reverse(before in tag_set(), after in tag_set()) {
        let old = AssetRecord { tags: before, ..Default::default() };
        let new = AssetRecord { tags: after, ..Default::default() };

        let forward = old.changes_to(&new);
        let backward = new.changes_to(&old);
        prop_assert_eq!(&forward.added_tags, &backward.removed_tags);
        prop_assert_eq!(&forward.removed_tags, &backward.added_tags);
        prop_assert_eq!(forward.is_empty(), old == new);
    }
}
