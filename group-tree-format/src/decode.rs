//! FILENAME: group-tree-format/src/decode.rs
//! Decoding - rebuilds trees from the `dataType` tag, never from shape.

use group_tree::{BranchBuilder, Key, KeyIndex, Node, GROUP_TREE_TAG};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::FormatError;

/// Parses tagged JSON back into a tree.
///
/// Objects tagged `GroupTree` become branches (checked by `BranchBuilder`);
/// anything else is handed to the leaf type's own deserializer.
pub fn decode<L: DeserializeOwned>(text: &str) -> Result<Node<L>, FormatError> {
    let value: Value = serde_json::from_str(text)?;
    let tree = from_tagged_value(value)?;
    log::debug!(
        "decoded group tree: depth={} leaves={}",
        tree.depth(),
        tree.leaf_count()
    );
    Ok(tree)
}

/// Parses a tagged `Map` back into a key index.
pub fn decode_index<R: DeserializeOwned>(text: &str) -> Result<KeyIndex<R>, FormatError> {
    Ok(serde_json::from_str(text)?)
}

pub fn from_tagged_value<L: DeserializeOwned>(value: Value) -> Result<Node<L>, FormatError> {
    match value {
        Value::Object(object) if is_group_tree(&object) => decode_branch(object),
        other => Ok(Node::Leaf(serde_json::from_value(other)?)),
    }
}

fn is_group_tree(object: &Map<String, Value>) -> bool {
    object.get("dataType").and_then(Value::as_str) == Some(GROUP_TREE_TAG)
}

fn decode_branch<L: DeserializeOwned>(mut object: Map<String, Value>) -> Result<Node<L>, FormatError> {
    let source = match object.remove("source") {
        Some(Value::String(source)) => source,
        other => {
            return Err(FormatError::MalformedBranch(format!(
                "source must be a string, found {}",
                other.unwrap_or(Value::Null)
            )))
        }
    };
    let Some(Value::Array(entries)) = object.remove("data") else {
        return Err(FormatError::MalformedBranch(format!(
            "branch '{}' has no data array",
            source
        )));
    };

    let mut builder = BranchBuilder::new(source.clone());
    for entry in entries {
        let Value::Array(pair) = entry else {
            return Err(FormatError::MalformedBranch(format!(
                "branch '{}' entry is not a [key, child] pair: {}",
                source, entry
            )));
        };
        let [key, child]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
            FormatError::MalformedBranch(format!(
                "branch '{}' entry has {} elements, expected 2",
                source,
                pair.len()
            ))
        })?;
        let key: Key = serde_json::from_value(key)?;
        builder.push(key, from_tagged_value(child)?);
    }

    Ok(Node::Branch(builder.build()?))
}
