//! FILENAME: group-tree/src/group.rs
//! Grouping engine - partitions a flat collection into an n-level tree.
//!
//! Algorithm:
//! 1. Compute the first key for every record and bucket the records by it,
//!    keeping buckets in first-seen order (a key -> position table plus an
//!    ordered bucket list, the same interning scheme the pivot cache uses).
//! 2. If keys remain, re-partition each bucket by the rest of the keys.
//! 3. Otherwise each bucket becomes a leaf.

use rustc_hash::FxHashMap;

use crate::error::GroupTreeError;
use crate::key::Key;
use crate::node::{Branch, Node};
use crate::record::{KeySpec, Record};

/// Groups a borrowed collection, cloning each record into its leaf.
pub fn build_group_tree<R>(
    collection: &[R],
    keys: &[KeySpec<R>],
) -> Result<Node<Vec<R>>, GroupTreeError>
where
    R: Record + Clone,
{
    group_records(collection.to_vec(), keys)
}

/// Groups an owned collection, moving each record into its leaf.
///
/// Fails with `NotACollection` on empty input and `NoGroupingKeys` when
/// `keys` is empty. The first accessor error aborts the whole build.
pub fn group_records<R: Record>(
    collection: Vec<R>,
    keys: &[KeySpec<R>],
) -> Result<Node<Vec<R>>, GroupTreeError> {
    if collection.is_empty() {
        return Err(GroupTreeError::NotACollection);
    }
    if keys.is_empty() {
        return Err(GroupTreeError::NoGroupingKeys);
    }

    let record_count = collection.len();
    let tree = partition(collection, keys)?;

    log::debug!(
        "grouped {} records by [{}] into {} leaves",
        record_count,
        keys.iter().map(KeySpec::name).collect::<Vec<_>>().join(", "),
        tree.leaf_count()
    );
    Ok(tree)
}

/// Splits `records` on `keys[0]`, recursing once per remaining key.
fn partition<R: Record>(
    records: Vec<R>,
    keys: &[KeySpec<R>],
) -> Result<Node<Vec<R>>, GroupTreeError> {
    let Some((spec, rest)) = keys.split_first() else {
        return Ok(Node::Leaf(records));
    };

    let mut key_to_pos: FxHashMap<Key, usize> = FxHashMap::default();
    let mut buckets: Vec<(Key, Vec<R>)> = Vec::new();

    for record in records {
        let key = spec.key_of(&record)?;
        match key_to_pos.get(&key) {
            Some(&pos) => buckets[pos].1.push(record),
            None => {
                key_to_pos.insert(key.clone(), buckets.len());
                buckets.push((key, vec![record]));
            }
        }
    }

    let children = buckets
        .into_iter()
        .map(|(key, bucket)| partition(bucket, rest).map(|child| (key, child)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node::Branch(Branch::from_unique(
        spec.name().to_string(),
        children,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn create_test_records() -> Vec<Value> {
        vec![
            json!({"city": "Seattle", "month": "Aug", "temp": 21}),
            json!({"city": "Seattle", "month": "Apr", "temp": 12}),
            json!({"city": "NY", "month": "Apr", "temp": 14}),
            json!({"city": "Seattle", "month": "Aug", "temp": 25}),
        ]
    }

    #[test]
    fn test_single_level_keeps_first_seen_order() {
        let records = create_test_records();
        let tree = build_group_tree(&records, &["city".into()]).unwrap();

        let branch = tree.as_branch().unwrap();
        assert_eq!(branch.source(), "city");
        assert_eq!(branch.keys().cloned().collect::<Vec<_>>(), vec![Key::from("Seattle"), Key::from("NY")]);

        let seattle = branch.get(&Key::from("Seattle")).and_then(Node::as_leaf).unwrap();
        assert_eq!(seattle, &vec![records[0].clone(), records[1].clone(), records[3].clone()]);
    }

    #[test]
    fn test_two_levels_recurse_into_buckets() {
        let records = create_test_records();
        let tree = build_group_tree(&records, &["city".into(), "month".into()]).unwrap();

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.sources(), vec!["city", "month"]);
        assert_eq!(tree.leaf_count(), 3);

        let aug = tree
            .find(&[Key::from("Seattle"), Key::from("Aug")])
            .and_then(Node::as_leaf)
            .unwrap();
        assert_eq!(aug.len(), 2);
    }

    #[test]
    fn test_accessor_keys_and_owned_input() {
        let records = create_test_records();
        let warm = KeySpec::accessor("warm", |r: &Value| r["temp"].as_i64().map(|t| t >= 20));
        let tree = group_records(records, &[warm]).unwrap();

        let branch = tree.as_branch().unwrap();
        assert_eq!(branch.source(), "warm");
        assert_eq!(branch.keys().cloned().collect::<Vec<_>>(), vec![Key::Bool(true), Key::Bool(false)]);
    }

    #[test]
    fn test_array_keys_do_not_merge_with_their_text() {
        let records = vec![
            json!({"tag": [1, 2], "id": 1}),
            json!({"tag": "[1,2]", "id": 2}),
            json!({"tag": {"a": 1, "b": 2}, "id": 3}),
            json!({"tag": {"b": 2, "a": 1}, "id": 4}),
        ];
        let tree = build_group_tree(&records, &["tag".into()]).unwrap();

        let branch = tree.as_branch().unwrap();
        assert_eq!(branch.len(), 3);
        assert_eq!(branch.get(&Key::from(&json!([1, 2]))).and_then(Node::as_leaf).map(Vec::len), Some(1));
        assert_eq!(branch.get(&Key::from("[1,2]")).and_then(Node::as_leaf).map(Vec::len), Some(1));

        let rows = crate::reduce::reduce(&tree, |records, _| {
            let mut row = crate::Row::new();
            row.insert("n".to_string(), records.len().into());
            row
        });
        assert_eq!(rows[0]["tag"], json!([1, 2]));
        assert_eq!(rows[1]["tag"], json!("[1,2]"));
        assert_eq!(rows[2]["tag"], json!({"a": 1, "b": 2}));
        assert_eq!(rows[2]["n"], json!(2));
    }

    #[test]
    fn test_nan_keys_share_a_bucket_apart_from_null() {
        let records = vec![json!({"x": null}), json!({"x": 0}), json!({"x": 0})];
        let ratio = KeySpec::accessor("ratio", |r: &Value| {
            r["x"].as_f64().map(|x| x / 0.0)
        });
        let tree = build_group_tree(&records, &[ratio]).unwrap();

        let branch = tree.as_branch().unwrap();
        assert_eq!(branch.keys().cloned().collect::<Vec<_>>(), vec![Key::Null, Key::from(f64::NAN)]);
        assert_eq!(branch.get(&Key::from(f64::NAN)).and_then(Node::as_leaf).map(Vec::len), Some(2));

        let rows = crate::reduce::reduce(&tree, |_, _| crate::Row::new());
        assert_eq!(rows[0]["ratio"], Value::Null);
        assert_eq!(rows[1]["ratio"], json!({"dataType": "Float", "value": "NaN"}));
    }

    #[test]
    fn test_missing_field_groups_under_null() {
        let records = vec![json!({"city": "NY"}), json!({})];
        let tree = build_group_tree(&records, &["city".into()]).unwrap();

        assert!(tree.find(&[Key::Null]).is_some());
    }

    #[test]
    fn test_empty_input_is_rejected_rather_than_grouped_into_an_empty_tree() {
        let records: Vec<Value> = Vec::new();
        let err = build_group_tree(&records, &["city".into()]).unwrap_err();
        assert!(matches!(err, GroupTreeError::NotACollection));
    }

    #[test]
    fn test_no_keys_is_rejected() {
        let records = create_test_records();
        let err = build_group_tree(&records, &[]).unwrap_err();
        assert!(matches!(err, GroupTreeError::NoGroupingKeys));
    }

    #[test]
    fn test_accessor_error_aborts_grouping() {
        let records = create_test_records();
        let strict = KeySpec::try_accessor("zone", |r: &Value| {
            r["zone"].as_str().map(str::to_string).ok_or("no zone")
        });

        let err = build_group_tree(&records, &["city".into(), strict]).unwrap_err();
        assert!(matches!(err, GroupTreeError::Accessor { .. }));
    }
}
