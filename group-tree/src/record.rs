//! FILENAME: group-tree/src/record.rs
//! Records and key specifications.
//!
//! A record is any caller-defined value. Grouping only needs one thing from
//! it: the key for a given field name, which the `Record` trait provides.
//! Callers that key by something other than a named field pass an accessor.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{BoxError, GroupTreeError};
use crate::key::Key;

/// Field-name lookup on a record. Missing fields yield `Key::Null`.
pub trait Record {
    fn field(&self, name: &str) -> Key;
}

impl Record for Map<String, Value> {
    fn field(&self, name: &str) -> Key {
        self.get(name).map(Key::from).unwrap_or(Key::Null)
    }
}

impl Record for Value {
    fn field(&self, name: &str) -> Key {
        match self {
            Value::Object(map) => map.field(name),
            _ => Key::Null,
        }
    }
}

impl Record for HashMap<String, Key> {
    fn field(&self, name: &str) -> Key {
        self.get(name).cloned().unwrap_or(Key::Null)
    }
}

impl Record for BTreeMap<String, Key> {
    fn field(&self, name: &str) -> Key {
        self.get(name).cloned().unwrap_or(Key::Null)
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn field(&self, name: &str) -> Key {
        (**self).field(name)
    }
}

// ============================================================================
// KEY SPECIFICATION
// ============================================================================

type AccessorFn<R> = Box<dyn Fn(&R) -> Result<Key, BoxError>>;

/// How one level of the tree derives its key from a record.
pub enum KeySpec<R> {
    /// Read a named field through `Record::field`.
    Field(String),
    /// Compute the key with a closure. `name` becomes the branch source.
    Accessor { name: String, accessor: AccessorFn<R> },
}

impl<R> KeySpec<R> {
    pub fn field(name: impl Into<String>) -> Self {
        KeySpec::Field(name.into())
    }

    pub fn accessor<K, F>(name: impl Into<String>, f: F) -> Self
    where
        R: 'static,
        K: Into<Key> + 'static,
        F: Fn(&R) -> K + 'static,
    {
        KeySpec::Accessor {
            name: name.into(),
            accessor: Box::new(move |record: &R| -> Result<Key, BoxError> { Ok(f(record).into()) }),
        }
    }

    /// An accessor that may fail. Its error reaches the caller as
    /// `GroupTreeError::Accessor` with the original error as source.
    pub fn try_accessor<K, E, F>(name: impl Into<String>, f: F) -> Self
    where
        R: 'static,
        K: Into<Key> + 'static,
        E: Into<BoxError> + 'static,
        F: Fn(&R) -> Result<K, E> + 'static,
    {
        KeySpec::Accessor {
            name: name.into(),
            accessor: Box::new(move |record: &R| -> Result<Key, BoxError> {
                f(record).map(Into::into).map_err(Into::into)
            }),
        }
    }

    /// The name recorded as `Branch::source` for this level.
    pub fn name(&self) -> &str {
        match self {
            KeySpec::Field(name) => name,
            KeySpec::Accessor { name, .. } => name,
        }
    }
}

impl<R: Record> KeySpec<R> {
    pub fn key_of(&self, record: &R) -> Result<Key, GroupTreeError> {
        match self {
            KeySpec::Field(name) => Ok(record.field(name)),
            KeySpec::Accessor { name, accessor } => {
                accessor(record).map_err(|error| GroupTreeError::Accessor {
                    source_name: name.clone(),
                    error,
                })
            }
        }
    }
}

impl<R> fmt::Debug for KeySpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Field(name) => f.debug_tuple("Field").field(name).finish(),
            KeySpec::Accessor { name, .. } => f.debug_tuple("Accessor").field(name).finish(),
        }
    }
}

impl<R> From<&str> for KeySpec<R> {
    fn from(name: &str) -> Self {
        KeySpec::Field(name.to_string())
    }
}

impl<R> From<String> for KeySpec<R> {
    fn from(name: String) -> Self {
        KeySpec::Field(name)
    }
}
