//! FILENAME: group-tree/src/map.rs
//! Mapping engine - replaces leaf payloads while keeping the branch shape.

use std::convert::Infallible;

use crate::node::{Branch, Node};
use crate::path::PathContext;

/// Builds a new tree with the same sources, keys and key order as `tree`,
/// whose leaves hold `map_fn(leaf, path)`. The input is left untouched.
pub fn map_tree<L, M, F>(tree: &Node<L>, mut map_fn: F) -> Node<M>
where
    F: FnMut(&L, &PathContext) -> M,
{
    match try_map_tree(tree, |leaf, path| Ok::<M, Infallible>(map_fn(leaf, path))) {
        Ok(mapped) => mapped,
        Err(never) => match never {},
    }
}

/// `map_tree` with a fallible function. Nothing is returned on error.
pub fn try_map_tree<L, M, E, F>(tree: &Node<L>, mut map_fn: F) -> Result<Node<M>, E>
where
    F: FnMut(&L, &PathContext) -> Result<M, E>,
{
    let mut path = PathContext::new();
    map_node(tree, &mut path, &mut map_fn)
}

fn map_node<L, M, E, F>(node: &Node<L>, path: &mut PathContext, map_fn: &mut F) -> Result<Node<M>, E>
where
    F: FnMut(&L, &PathContext) -> Result<M, E>,
{
    match node {
        Node::Leaf(payload) => map_fn(payload, path).map(Node::Leaf),
        Node::Branch(branch) => {
            let mut children = Vec::with_capacity(branch.len());
            for (key, child) in branch.children() {
                path.push(branch.source(), key);
                let mapped = map_node(child, path, map_fn);
                path.pop();
                children.push((key.clone(), mapped?));
            }
            Ok(Node::Branch(Branch::from_unique(
                branch.source().to_string(),
                children,
            )))
        }
    }
}

impl<L> Node<L> {
    pub fn map<M, F>(&self, map_fn: F) -> Node<M>
    where
        F: FnMut(&L, &PathContext) -> M,
    {
        map_tree(self, map_fn)
    }
}
