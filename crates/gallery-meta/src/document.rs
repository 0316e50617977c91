//! The collection metadata document
//!
//! On disk the document is a JSON object keyed by asset id:
//!
//! ```json
//! {
//!   "photos/beach.jpg": { "tags": ["summer", "sea"], "rating": 4 },
//!   "photos/cat.png": { "tags": [] }
//! }
//! ```
//!
//! `tags` is treated as a set; every other key is a property compared by value.
//! A non-object entry is kept as the single property `value`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::{Error, Result};

const TAGS_KEY: &str = "tags";
const SCALAR_KEY: &str = "value";

/// Metadata attached to one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetRecord {
    pub tags: BTreeSet<String>,
    pub properties: BTreeMap<String, Value>,
}

/// What changed between two versions of one asset's record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChanges {
    pub added_tags: Vec<String>,
    pub removed_tags: Vec<String>,
    /// Properties added, removed or given a different value
    pub changed_properties: Vec<String>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.added_tags.is_empty()
            && self.removed_tags.is_empty()
            && self.changed_properties.is_empty()
    }
}

impl AssetRecord {
    /// Record with the given tags and no properties.
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            properties: BTreeMap::new(),
        }
    }

    fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            let mut properties = BTreeMap::new();
            properties.insert(SCALAR_KEY.to_string(), value);
            return Self {
                tags: BTreeSet::new(),
                properties,
            };
        };

        let mut record = Self::default();
        for (key, value) in map {
            match value {
                Value::Array(items) if key == TAGS_KEY => {
                    record.tags = items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(tag) => tag,
                            other => other.to_string(),
                        })
                        .collect();
                }
                value => {
                    record.properties.insert(key, value);
                }
            }
        }
        record
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            TAGS_KEY.to_string(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Differences going from `self` to `other`.
    pub fn changes_to(&self, other: &AssetRecord) -> RecordChanges {
        let keys: BTreeSet<&String> = self
            .properties
            .keys()
            .chain(other.properties.keys())
            .collect();

        RecordChanges {
            added_tags: other.tags.difference(&self.tags).cloned().collect(),
            removed_tags: self.tags.difference(&other.tags).cloned().collect(),
            changed_properties: keys
                .into_iter()
                .filter(|key| self.properties.get(*key) != other.properties.get(*key))
                .cloned()
                .collect(),
        }
    }
}

/// The whole metadata document, keyed by asset id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDocument {
    assets: BTreeMap<String, AssetRecord>,
}

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw file content. Blank content is an empty document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_slice(content.as_bytes())
    }

    /// Parse content that may be absent. `None` is an empty document.
    pub fn from_optional(bytes: Option<&[u8]>) -> Result<Self> {
        bytes.map_or_else(|| Ok(Self::new()), Self::from_slice)
    }

    fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::InvalidDocument {
                message: "top-level value must be an object keyed by asset id".to_string(),
            });
        };
        Ok(Self {
            assets: map
                .into_iter()
                .map(|(id, value)| (id, AssetRecord::from_value(value)))
                .collect(),
        })
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let map: Map<String, Value> = self
            .assets
            .iter()
            .map(|(id, record)| (id.clone(), record.to_value()))
            .collect();
        let mut out = serde_json::to_string_pretty(&Value::Object(map))?;
        out.push('\n');
        Ok(out)
    }

    pub fn get(&self, id: &str) -> Option<&AssetRecord> {
        self.assets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, record: AssetRecord) -> Option<AssetRecord> {
        self.assets.insert(id.into(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<AssetRecord> {
        self.assets.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetRecord)> {
        self.assets.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_tags_and_properties() {
        let doc = MetadataDocument::from_json_str(
            r#"{"a.jpg": {"tags": ["sea", "summer"], "rating": 4}, "b.png": 7}"#,
        )
        .unwrap();

        let a = doc.get("a.jpg").unwrap();
        assert_eq!(a.tags, BTreeSet::from(["sea".into(), "summer".into()]));
        assert_eq!(a.properties.get("rating"), Some(&json!(4)));

        let b = doc.get("b.png").unwrap();
        assert!(b.tags.is_empty());
        assert_eq!(b.properties.get("value"), Some(&json!(7)));
    }

    #[test]
    fn test_tag_order_is_irrelevant() {
        let one = MetadataDocument::from_json_str(r#"{"a": {"tags": ["x", "y"]}}"#).unwrap();
        let two = MetadataDocument::from_json_str(r#"{"a": {"tags": ["y", "x", "x"]}}"#).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(MetadataDocument::from_slice(b"  \n").unwrap().is_empty());
        assert!(MetadataDocument::from_optional(None).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = MetadataDocument::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
        assert!(matches!(
            MetadataDocument::from_json_str("{").unwrap_err(),
            Error::Json(_)
        ));
    }

    #[test]
    fn test_changes_to() {
        let before = AssetRecord {
            tags: BTreeSet::from(["a".into(), "b".into()]),
            properties: BTreeMap::from([
                ("rating".into(), json!(3)),
                ("title".into(), json!("x")),
            ]),
        };
        let after = AssetRecord {
            tags: BTreeSet::from(["b".into(), "c".into()]),
            properties: BTreeMap::from([
                ("rating".into(), json!(5)),
                ("title".into(), json!("x")),
                ("place".into(), json!("Oslo")),
            ]),
        };

        let changes = before.changes_to(&after);
        assert_eq!(changes.added_tags, vec!["c"]);
        assert_eq!(changes.removed_tags, vec!["a"]);
        assert_eq!(changes.changed_properties, vec!["place", "rating"]);
        assert!(before.changes_to(&before).is_empty());
    }

    #[test]
    fn test_pretty_output_parses_back_equal() {
        let mut doc = MetadataDocument::new();
        doc.insert("z.jpg", AssetRecord::with_tags(["night"]));
        doc.insert("a.jpg", AssetRecord::default());
        let text = doc.to_json_pretty().unwrap();
        assert!(text.ends_with("}\n"));
        assert_eq!(MetadataDocument::from_json_str(&text).unwrap(), doc);
    }
}
