//! FILENAME: group-tree/src/error.rs

use thiserror::Error;

use crate::key::Key;

/// Boxed error raised by a fallible key accessor or caller-supplied function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum GroupTreeError {
    #[error("Not a collection: input is empty")]
    NotACollection,

    #[error("At least one grouping key is required")]
    NoGroupingKeys,

    #[error("Duplicate key {key}: already holds {existing}, cannot also hold {incoming}")]
    DuplicateKey {
        key: Key,
        existing: String,
        incoming: String,
    },

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid reducer spec: {0}")]
    InvalidReducerSpec(String),

    #[error("Accessor '{source_name}' failed: {error}")]
    Accessor {
        source_name: String,
        #[source]
        error: BoxError,
    },
}

impl GroupTreeError {
    pub(crate) fn invalid_node(msg: impl Into<String>) -> Self {
        GroupTreeError::InvalidNode(msg.into())
    }

    pub(crate) fn invalid_spec(msg: impl Into<String>) -> Self {
        GroupTreeError::InvalidReducerSpec(msg.into())
    }
}
