//! FILENAME: group-tree-format/src/error.rs

use group_tree::GroupTreeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tree: {0}")]
    Tree(#[from] GroupTreeError),

    #[error("Malformed branch: {0}")]
    MalformedBranch(String),
}
