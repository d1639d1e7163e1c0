//! FILENAME: group-tree/src/lib.rs
//! Hierarchical grouping and reduction engine.
//!
//! Groups a flat collection of records into an n-level tree keyed by field
//! values, then folds, maps or re-flattens that tree with the ancestor key
//! path reattached at each leaf.
//!
//! Layers:
//! - `key`: Canonical, hashable group keys (floats, timestamps)
//! - `record`: Field lookup and per-level key specifications
//! - `node`: The tree itself and its builder (WHAT we hold)
//! - `group` / `index`: Construction from records (HOW we split)
//! - `reduce` / `map`: Traversals over a built tree (WHAT callers get back)

pub mod error;
pub mod group;
pub mod index;
pub mod key;
pub mod map;
pub mod node;
pub mod path;
pub mod record;
pub mod reduce;

/// A flat output record. Field order is preserved.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub use error::{BoxError, GroupTreeError};
pub use group::{build_group_tree, group_records};
pub use index::{index_by, KeyIndex, MAP_TAG};
pub use key::{CompositeKey, Key, OrderedFloat, FLOAT_TAG};
pub use map::{map_tree, try_map_tree};
pub use node::{Branch, BranchBuilder, Node, GROUP_TREE_TAG};
pub use path::PathContext;
pub use record::{KeySpec, Record};
pub use reduce::{
    object_reduce, reduce, reduce_separate, reduce_separate_with, try_reduce,
    try_reduce_separate, FieldReducers, ReducerRegistry, SeparateOptions,
};
