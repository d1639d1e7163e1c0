//! FILENAME: group-tree/src/path.rs
//! Path context - the ancestor keys chosen on the way down to a node.

use smallvec::SmallVec;

use crate::key::Key;
use crate::Row;

/// Ordered `(source, key)` pairs from the root to the current node.
///
/// Trees are rarely more than a handful of levels deep, so the pairs live
/// inline until the fifth level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    entries: SmallVec<[(String, Key); 4]>,
}

impl PathContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key chosen for `source`. When two levels share a source name the
    /// deepest one wins, matching how `to_row` overwrites.
    pub fn get(&self, source: &str) -> Option<&Key> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| name == source)
            .map(|(_, key)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Key)> {
        self.entries.iter().map(|(name, key)| (name.as_str(), key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(_, key)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the path as the leading fields of an output row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        for (name, key) in &self.entries {
            row.insert(name.clone(), key.to_value());
        }
        row
    }

    pub(crate) fn push(&mut self, source: &str, key: &Key) {
        self.entries.push((source.to_string(), key.clone()));
    }

    pub(crate) fn pop(&mut self) {
        self.entries.pop();
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}
