//! FILENAME: group-tree/src/node.rs
//! Group tree nodes.
//!
//! A tree is either a `Leaf` holding a payload (the grouped records, or
//! whatever a mapping replaced them with) or a `Branch` that splits on one
//! source field. Branches are immutable once built; every child of a branch
//! is the same variant, so the depth of a tree equals the number of keys it
//! was grouped by.

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::GroupTreeError;
use crate::key::Key;
use crate::path::PathContext;

/// `dataType` tag written for branches.
pub const GROUP_TREE_TAG: &str = "GroupTree";

// ============================================================================
// NODE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Node<L> {
    Leaf(L),
    Branch(Branch<L>),
}

impl<L> Node<L> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Node::Leaf(payload) => Some(payload),
            Node::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Branch<L>> {
        match self {
            Node::Leaf(_) => None,
            Node::Branch(branch) => Some(branch),
        }
    }

    /// Number of branch levels above the leaves. A bare leaf has depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self;
        while let Node::Branch(branch) = node {
            depth += 1;
            match branch.children.first() {
                Some((_, child)) => node = child,
                None => break,
            }
        }
        depth
    }

    /// Source field of every level, root first.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources = Vec::new();
        let mut node = self;
        while let Node::Branch(branch) = node {
            sources.push(branch.source.as_str());
            match branch.children.first() {
                Some((_, child)) => node = child,
                None => break,
            }
        }
        sources
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Branch(branch) => branch.children.iter().map(|(_, c)| c.leaf_count()).sum(),
        }
    }

    /// Follows `path` key by key from this node.
    pub fn find(&self, path: &[Key]) -> Option<&Node<L>> {
        let mut node = self;
        for key in path {
            node = node.as_branch()?.get(key)?;
        }
        Some(node)
    }

    /// Visits every leaf in pre-order with its path context.
    ///
    /// Uses an explicit work stack, so traversal depth is not bounded by the
    /// call stack.
    pub fn try_for_each_leaf<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&L, &PathContext) -> Result<(), E>,
    {
        let mut path = PathContext::new();
        // (node, path length at this node, edge taken to reach it)
        let mut stack: Vec<(&Node<L>, usize, Option<(&str, &Key)>)> = vec![(self, 0, None)];

        while let Some((node, depth, edge)) = stack.pop() {
            path.truncate(depth);
            if let Some((source, key)) = edge {
                path.push(source, key);
            }

            match node {
                Node::Leaf(payload) => f(payload, &path)?,
                Node::Branch(branch) => {
                    let child_depth = path.len();
                    for (key, child) in branch.children.iter().rev() {
                        stack.push((child, child_depth, Some((branch.source.as_str(), key))));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn for_each_leaf<F>(&self, mut f: F)
    where
        F: FnMut(&L, &PathContext),
    {
        let _ = self.try_for_each_leaf(|leaf, path| {
            f(leaf, path);
            Ok::<(), std::convert::Infallible>(())
        });
    }

    /// Every leaf with its path context, in traversal order.
    pub fn leaves(&self) -> Vec<(PathContext, &L)> {
        let mut out = Vec::with_capacity(self.leaf_count());
        // Payload references must outlive the closure, so walk by hand.
        collect_leaves(self, &mut PathContext::new(), &mut out);
        out
    }
}

fn collect_leaves<'a, L>(
    node: &'a Node<L>,
    path: &mut PathContext,
    out: &mut Vec<(PathContext, &'a L)>,
) {
    match node {
        Node::Leaf(payload) => out.push((path.clone(), payload)),
        Node::Branch(branch) => {
            for (key, child) in &branch.children {
                path.push(&branch.source, key);
                collect_leaves(child, path, out);
                path.pop();
            }
        }
    }
}

impl<R: Clone> Node<Vec<R>> {
    /// Re-flattens the tree into its records, leaf by leaf.
    pub fn flatten(&self) -> Vec<R> {
        let mut records = Vec::new();
        self.for_each_leaf(|leaf, _| records.extend(leaf.iter().cloned()));
        records
    }
}

// ============================================================================
// BRANCH
// ============================================================================

/// A split on one source field. Children keep first-seen key order.
#[derive(Debug, Clone)]
pub struct Branch<L> {
    source: String,
    children: Vec<(Key, Node<L>)>,
    key_to_pos: FxHashMap<Key, usize>,
}

impl<L> Branch<L> {
    /// Builds a branch whose invariants the caller already guarantees.
    pub(crate) fn from_unique(source: String, children: Vec<(Key, Node<L>)>) -> Self {
        let key_to_pos = children
            .iter()
            .enumerate()
            .map(|(pos, (key, _))| (key.clone(), pos))
            .collect();
        Branch {
            source,
            children,
            key_to_pos,
        }
    }

    pub fn builder(source: impl Into<String>) -> BranchBuilder<L> {
        BranchBuilder::new(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, key: &Key) -> Option<&Node<L>> {
        self.key_to_pos.get(key).map(|&pos| &self.children[pos].1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.children.iter().map(|(key, _)| key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&Key, &Node<L>)> {
        self.children.iter().map(|(key, child)| (key, child))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn into_children(self) -> Vec<(Key, Node<L>)> {
        self.children
    }
}

impl<L: PartialEq> PartialEq for Branch<L> {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.children == other.children
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Assembles a branch by hand (or from decoded text) and checks it.
#[derive(Debug)]
pub struct BranchBuilder<L> {
    source: String,
    children: Vec<(Key, Node<L>)>,
}

impl<L> BranchBuilder<L> {
    pub fn new(source: impl Into<String>) -> Self {
        BranchBuilder {
            source: source.into(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, key: impl Into<Key>, node: Node<L>) -> Self {
        self.children.push((key.into(), node));
        self
    }

    pub fn push(&mut self, key: impl Into<Key>, node: Node<L>) {
        self.children.push((key.into(), node));
    }

    /// Fails with `InvalidNode` if the branch is empty, repeats a key, or
    /// mixes leaves with branches or branches of different shape.
    pub fn build(self) -> Result<Branch<L>, GroupTreeError> {
        let BranchBuilder { source, children } = self;

        let Some((_, first)) = children.first() else {
            return Err(GroupTreeError::invalid_node(format!(
                "branch '{}' has no children",
                source
            )));
        };
        // Children are already checked, so each one's first-child chain is its shape.
        let expected = first.sources();

        let mut key_to_pos = FxHashMap::default();
        for (pos, (key, child)) in children.iter().enumerate() {
            if key_to_pos.insert(key.clone(), pos).is_some() {
                return Err(GroupTreeError::invalid_node(format!(
                    "branch '{}' repeats key {}",
                    source, key
                )));
            }
            if child.sources() != expected {
                return Err(GroupTreeError::invalid_node(format!(
                    "branch '{}' mixes child shapes at key {}",
                    source, key
                )));
            }
        }

        Ok(Branch {
            source,
            children,
            key_to_pos,
        })
    }
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Branches serialize as `{dataType: "GroupTree", source, data: [[key, child], ...]}`;
/// leaves serialize as their payload.
impl<L: Serialize> Serialize for Node<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Leaf(payload) => payload.serialize(serializer),
            Node::Branch(branch) => branch.serialize(serializer),
        }
    }
}

impl<L: Serialize> Serialize for Branch<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("dataType", GROUP_TREE_TAG)?;
        map.serialize_entry("source", &self.source)?;
        map.serialize_entry("data", &Entries(&self.children))?;
        map.end()
    }
}

/// Ordered `[key, value]` pairs, shared by branches and key indexes.
pub(crate) struct Entries<'a, V>(pub(crate) &'a [(Key, V)]);

impl<V: Serialize> Serialize for Entries<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in self.0 {
            seq.serialize_element(&(key, value))?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_tree() -> Node<Vec<i32>> {
        let seattle = Branch::builder("month")
            .child("Aug", Node::Leaf(vec![1]))
            .child("Apr", Node::Leaf(vec![2]))
            .build()
            .unwrap();
        let ny = Branch::builder("month")
            .child("Apr", Node::Leaf(vec![3, 4]))
            .build()
            .unwrap();
        Node::Branch(
            Branch::builder("city")
                .child("Seattle", Node::Branch(seattle))
                .child("NY", Node::Branch(ny))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_tree_queries() {
        let tree = create_test_tree();

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.sources(), vec!["city", "month"]);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.flatten(), vec![1, 2, 3, 4]);
        assert_eq!(
            tree.find(&[Key::from("NY"), Key::from("Apr")]).and_then(Node::as_leaf),
            Some(&vec![3, 4])
        );
        assert!(tree.find(&[Key::from("LA")]).is_none());
    }

    #[test]
    fn test_leaves_carry_paths_in_preorder() {
        let tree = create_test_tree();
        let paths: Vec<Vec<Key>> = tree
            .leaves()
            .into_iter()
            .map(|(path, _)| path.keys().cloned().collect())
            .collect();

        assert_eq!(
            paths,
            vec![
                vec![Key::from("Seattle"), Key::from("Aug")],
                vec![Key::from("Seattle"), Key::from("Apr")],
                vec![Key::from("NY"), Key::from("Apr")],
            ]
        );
    }

    #[test]
    fn test_builder_rejects_repeated_keys() {
        let err = Branch::builder("city")
            .child("NY", Node::Leaf(vec![1]))
            .child("NY", Node::Leaf(vec![2]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GroupTreeError::InvalidNode(_)));
    }

    #[test]
    fn test_builder_rejects_mixed_variants() {
        let inner = Branch::builder("month")
            .child("Apr", Node::Leaf(vec![1]))
            .build()
            .unwrap();
        let err = Branch::builder("city")
            .child("NY", Node::Branch(inner))
            .child("LA", Node::Leaf(vec![2]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GroupTreeError::InvalidNode(_)));
    }

    #[test]
    fn test_builder_rejects_sub_branches_that_differ_below_the_first_level() {
        let by_day = Branch::builder("day")
            .child(1, Node::Leaf(vec![1]))
            .build()
            .unwrap();
        let by_week = Branch::builder("week")
            .child(1, Node::Leaf(vec![2]))
            .build()
            .unwrap();
        let apr = Branch::builder("month")
            .child("Apr", Node::Branch(by_day))
            .build()
            .unwrap();
        let aug = Branch::builder("month")
            .child("Aug", Node::Branch(by_week))
            .build()
            .unwrap();

        let err = Branch::builder("city")
            .child("NY", Node::Branch(apr))
            .child("LA", Node::Branch(aug))
            .build()
            .unwrap_err();
        assert!(matches!(err, GroupTreeError::InvalidNode(_)));
    }

    #[test]
    fn test_builder_rejects_empty_branch() {
        let err = Branch::<Vec<i32>>::builder("city").build().unwrap_err();
        assert!(matches!(err, GroupTreeError::InvalidNode(_)));
    }

    #[test]
    fn test_branch_serializes_with_tag() {
        let branch = Branch::builder("city")
            .child("NY", Node::Leaf(vec![1]))
            .child(2, Node::Leaf(vec![]))
            .build()
            .unwrap();

        let value = serde_json::to_value(Node::Branch(branch)).unwrap();
        assert_eq!(
            value,
            json!({"dataType": "GroupTree", "source": "city", "data": [["NY", [1]], [2, []]]})
        );
    }
}
