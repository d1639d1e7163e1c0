//! FILENAME: group-tree/src/reduce.rs
//! Reduction engine - folds a tree into flat rows.
//!
//! Both modes walk the tree in pre-order and hand each leaf to the reducer
//! together with its path context:
//! - `reduce` emits one wide row per leaf: path fields, then reducer fields.
//! - `reduce_separate` emits one long-format row per reducer entry, carrying
//!   the path fields plus a name field and a value field.

use std::convert::Infallible;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GroupTreeError;
use crate::node::Node;
use crate::path::PathContext;
use crate::Row;

// ============================================================================
// REDUCE
// ============================================================================

/// One row per leaf. Reducer fields overwrite path fields of the same name.
pub fn reduce<L, F>(tree: &Node<L>, mut reduce_fn: F) -> Vec<Row>
where
    F: FnMut(&L, &PathContext) -> Row,
{
    match try_reduce(tree, |leaf, path| Ok::<Row, Infallible>(reduce_fn(leaf, path))) {
        Ok(rows) => rows,
        Err(never) => match never {},
    }
}

/// `reduce` with a fallible reducer. The first error aborts the fold and no
/// rows are returned.
pub fn try_reduce<L, E, F>(tree: &Node<L>, mut reduce_fn: F) -> Result<Vec<Row>, E>
where
    F: FnMut(&L, &PathContext) -> Result<Row, E>,
{
    let mut rows = Vec::with_capacity(tree.leaf_count());
    tree.try_for_each_leaf(|leaf, path| {
        let result = reduce_fn(leaf, path)?;
        let mut row = path.to_row();
        row.extend(result);
        rows.push(row);
        Ok(())
    })?;
    log::trace!("reduced {} leaves", rows.len());
    Ok(rows)
}

// ============================================================================
// REDUCE SEPARATE
// ============================================================================

/// Names of the synthetic fields `reduce_separate` adds to each row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeparateOptions {
    /// Field holding the reducer entry's name.
    pub name_field: String,
    /// Field holding the reducer entry's value.
    pub value_field: String,
}

impl Default for SeparateOptions {
    fn default() -> Self {
        SeparateOptions {
            name_field: "aggregate".to_string(),
            value_field: "value".to_string(),
        }
    }
}

pub fn reduce_separate<L, F>(tree: &Node<L>, reduce_fn: F) -> Vec<Row>
where
    F: FnMut(&L, &PathContext) -> Row,
{
    reduce_separate_with(tree, &SeparateOptions::default(), reduce_fn)
}

pub fn reduce_separate_with<L, F>(
    tree: &Node<L>,
    options: &SeparateOptions,
    mut reduce_fn: F,
) -> Vec<Row>
where
    F: FnMut(&L, &PathContext) -> Row,
{
    match try_reduce_separate(tree, options, |leaf, path| {
        Ok::<Row, Infallible>(reduce_fn(leaf, path))
    }) {
        Ok(rows) => rows,
        Err(never) => match never {},
    }
}

/// Long-format fold: for every `(name, value)` the reducer returns at a leaf,
/// emit the leaf's path fields plus `{name_field: name, value_field: value}`.
/// Rows follow reducer entry order within leaf order within tree order.
pub fn try_reduce_separate<L, E, F>(
    tree: &Node<L>,
    options: &SeparateOptions,
    mut reduce_fn: F,
) -> Result<Vec<Row>, E>
where
    F: FnMut(&L, &PathContext) -> Result<Row, E>,
{
    let mut rows = Vec::new();
    tree.try_for_each_leaf(|leaf, path| {
        let result = reduce_fn(leaf, path)?;
        let base = path.to_row();
        for (name, value) in result {
            let mut row = base.clone();
            row.insert(options.name_field.clone(), Value::String(name));
            row.insert(options.value_field.clone(), value);
            rows.push(row);
        }
        Ok(())
    })?;
    log::trace!("reduced tree into {} long-format rows", rows.len());
    Ok(rows)
}

// ============================================================================
// OBJECT REDUCE
// ============================================================================

type FieldFn<L> = Rc<dyn Fn(&L) -> Value>;

/// Ordered `{output field -> leaf function}` reducer.
pub struct FieldReducers<L> {
    fields: Vec<(String, FieldFn<L>)>,
}

impl<L> FieldReducers<L> {
    pub fn new() -> Self {
        FieldReducers { fields: Vec::new() }
    }

    pub fn field<V, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        L: 'static,
        V: Into<Value> + 'static,
        F: Fn(&L) -> V + 'static,
    {
        self.fields.push((name.into(), Rc::new(move |leaf: &L| -> Value { f(leaf).into() })));
        self
    }

    /// Resolves a declarative spec such as `{"total": "count"}` against
    /// `registry`. Every entry must name a registered reducer.
    pub fn from_spec(spec: &Value, registry: &ReducerRegistry<L>) -> Result<Self, GroupTreeError> {
        let Value::Object(entries) = spec else {
            return Err(GroupTreeError::invalid_spec(format!(
                "expected an object of output fields, found {}",
                spec
            )));
        };

        let mut fields = Vec::with_capacity(entries.len());
        for (output, entry) in entries {
            let Value::String(reducer_name) = entry else {
                return Err(GroupTreeError::invalid_spec(format!(
                    "field '{}' is not a reducer name: {}",
                    output, entry
                )));
            };
            let Some(f) = registry.get(reducer_name) else {
                return Err(GroupTreeError::invalid_spec(format!(
                    "field '{}' names unknown reducer '{}'",
                    output, reducer_name
                )));
            };
            fields.push((output.clone(), f));
        }
        Ok(FieldReducers { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Computes every field against the same leaf.
    pub fn apply(&self, leaf: &L) -> Row {
        self.fields
            .iter()
            .map(|(name, f)| (name.clone(), f(leaf)))
            .collect()
    }
}

impl<L> Default for FieldReducers<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Named leaf functions a declarative spec can refer to.
pub struct ReducerRegistry<L> {
    reducers: FxHashMap<String, FieldFn<L>>,
}

impl<L> ReducerRegistry<L> {
    pub fn new() -> Self {
        ReducerRegistry {
            reducers: FxHashMap::default(),
        }
    }

    pub fn register<V, F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        L: 'static,
        V: Into<Value> + 'static,
        F: Fn(&L) -> V + 'static,
    {
        self.reducers
            .insert(name.into(), Rc::new(move |leaf: &L| -> Value { f(leaf).into() }));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reducers.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<FieldFn<L>> {
        self.reducers.get(name).cloned()
    }
}

impl<L> Default for ReducerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static> ReducerRegistry<Vec<R>> {
    /// A registry preloaded with `count`, the number of records in a leaf.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("count", |records: &Vec<R>| records.len());
        registry
    }
}

/// `reduce` driven by a `FieldReducers` table.
pub fn object_reduce<L>(tree: &Node<L>, fields: &FieldReducers<L>) -> Vec<Row> {
    reduce(tree, |leaf, _| fields.apply(leaf))
}
