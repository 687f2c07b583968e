//! Tagged variant document value.
//!
//! The store this crate talks to is schemaless: documents are arbitrary
//! trees of scalars, ordered sequences, and string-keyed mappings. Rather
//! than letting every collaborator touch the store driver's native type,
//! everything in this crate — the walker, the validator, the repair
//! executor — operates on this one variant, and store drivers are
//! responsible for converting their native representation to/from it at
//! the boundary (see `postgres_store::value_from_json`).

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single node in a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// True for values the validator treats as "missing" (§3 Document Result).
    pub fn is_empty_or_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn mapping(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Mapping(pairs.into_iter().collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
