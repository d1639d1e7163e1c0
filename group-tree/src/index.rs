//! FILENAME: group-tree/src/index.rs
//! Key index - a flat, strictly unique `Key -> record` mapping.
//!
//! Unlike grouping, indexing never accumulates: the second record that maps
//! to an occupied key is an error.

use std::fmt::Debug;

use rustc_hash::FxHashMap;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::GroupTreeError;
use crate::key::Key;
use crate::node::Entries;
use crate::record::{KeySpec, Record};

/// `dataType` tag written for key indexes and other plain mappings.
pub const MAP_TAG: &str = "Map";

#[derive(Debug, Clone)]
pub struct KeyIndex<R> {
    entries: Vec<(Key, R)>,
    key_to_pos: FxHashMap<Key, usize>,
}

impl<R> KeyIndex<R> {
    pub fn new() -> Self {
        KeyIndex {
            entries: Vec::new(),
            key_to_pos: FxHashMap::default(),
        }
    }

    /// Inserts a new entry, handing the record back if the key is taken.
    pub fn try_insert(&mut self, key: Key, record: R) -> Result<(), (Key, R)> {
        if self.key_to_pos.contains_key(&key) {
            return Err((key, record));
        }
        self.key_to_pos.insert(key.clone(), self.entries.len());
        self.entries.push((key, record));
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Option<&R> {
        self.key_to_pos.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.key_to_pos.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &R)> {
        self.entries.iter().map(|(key, record)| (key, record))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R> Default for KeyIndex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: PartialEq> PartialEq for KeyIndex<R> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Indexes `collection` by `key`, failing on the first repeated key.
pub fn index_by<R>(collection: &[R], key: &KeySpec<R>) -> Result<KeyIndex<R>, GroupTreeError>
where
    R: Record + Clone + Debug,
{
    if collection.is_empty() {
        return Err(GroupTreeError::NotACollection);
    }

    let mut index = KeyIndex::new();
    for record in collection {
        let k = key.key_of(record)?;
        if let Err((k, incoming)) = index.try_insert(k, record.clone()) {
            let existing = index
                .get(&k)
                .map(|r| format!("{:?}", r))
                .unwrap_or_default();
            return Err(GroupTreeError::DuplicateKey {
                key: k,
                existing,
                incoming: format!("{:?}", incoming),
            });
        }
    }

    log::debug!(
        "indexed {} records by '{}'",
        index.len(),
        key.name()
    );
    Ok(index)
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Serializes as `{dataType: "Map", value: [[key, record], ...]}`.
impl<R: Serialize> Serialize for KeyIndex<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("dataType", MAP_TAG)?;
        map.serialize_entry("value", &Entries(&self.entries))?;
        map.end()
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaggedMap<R> {
    data_type: String,
    value: Vec<(Key, R)>,
}

impl<'de, R: Deserialize<'de>> Deserialize<'de> for KeyIndex<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = TaggedMap::<R>::deserialize(deserializer)?;
        if tagged.data_type != MAP_TAG {
            return Err(de::Error::custom(format!(
                "expected dataType \"{}\", found \"{}\"",
                MAP_TAG, tagged.data_type
            )));
        }

        let mut index = KeyIndex::new();
        for (key, record) in tagged.value {
            if let Err((key, _)) = index.try_insert(key, record) {
                return Err(de::Error::custom(format!("duplicate key {} in map", key)));
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn create_test_records(ids: &[i64]) -> Vec<Value> {
        ids.iter().map(|id| json!({"id": id, "name": format!("item-{id}")})).collect()
    }

    #[test]
    fn test_unique_keys_index_every_record() {
        let records = create_test_records(&[1, 2, 3]);
        let index = index_by(&records, &"id".into()).unwrap();

        assert_eq!(index.len(), records.len());
        assert_eq!(index.get(&Key::Int(2)), Some(&records[1]));
        assert_eq!(index.keys().cloned().collect::<Vec<_>>(), vec![Key::Int(1), Key::Int(2), Key::Int(3)]);
    }

    #[test]
    fn test_duplicate_key_reports_both_records() {
        let records = create_test_records(&[1, 1]);
        let err = index_by(&records, &"id".into()).unwrap_err();

        match err {
            GroupTreeError::DuplicateKey { key, existing, incoming } => {
                assert_eq!(key, Key::Int(1));
                assert!(existing.contains("item-1"));
                assert!(incoming.contains("item-1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_collection_is_rejected() {
        let records: Vec<Value> = Vec::new();
        let err = index_by(&records, &"id".into()).unwrap_err();
        assert!(matches!(err, GroupTreeError::NotACollection));
    }

    #[test]
    fn test_tagged_map_serde() {
        let records = create_test_records(&[7]);
        let index = index_by(&records, &"id".into()).unwrap();

        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(
            value,
            json!({"dataType": "Map", "value": [[7, {"id": 7, "name": "item-7"}]]})
        );

        let back: KeyIndex<Value> = serde_json::from_value(value).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn test_deserialize_rejects_wrong_tag_and_duplicates() {
        let wrong_tag = json!({"dataType": "GroupTree", "value": []});
        assert!(serde_json::from_value::<KeyIndex<Value>>(wrong_tag).is_err());

        let dup = json!({"dataType": "Map", "value": [[1, "a"], [1, "b"]]});
        assert!(serde_json::from_value::<KeyIndex<Value>>(dup).is_err());
    }
}
