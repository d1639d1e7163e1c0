//! FILENAME: group-tree-format/src/lib.rs
//! Tagged JSON format for group trees.
//!
//! A generic JSON map cannot tell a branch from a key index from a record,
//! so both containers carry a `dataType` tag:
//!
//! ```text
//! branch:    { "dataType": "GroupTree", "source": "city", "data": [["NY", <child>], ...] }
//! key index: { "dataType": "Map", "value": [[1, <record>], ...] }
//! ```
//!
//! Leaf payloads use their own serde encoding. Decoding rebuilds branches
//! from the tag and re-checks every branch invariant.

mod decode;
mod error;

pub use decode::{decode, decode_index, from_tagged_value};
pub use error::FormatError;

use group_tree::{KeyIndex, Node};
use serde::Serialize;
use serde_json::Value;

/// Encodes a tree as compact tagged JSON.
pub fn encode<L: Serialize>(tree: &Node<L>) -> Result<String, FormatError> {
    Ok(serde_json::to_string(tree)?)
}

pub fn encode_pretty<L: Serialize>(tree: &Node<L>) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Encodes a key index as compact tagged JSON.
pub fn encode_index<R: Serialize>(index: &KeyIndex<R>) -> Result<String, FormatError> {
    Ok(serde_json::to_string(index)?)
}

/// The tagged encoding as a JSON value, for embedding in larger documents.
pub fn to_tagged_value<L: Serialize>(tree: &Node<L>) -> Result<Value, FormatError> {
    Ok(serde_json::to_value(tree)?)
}
