//! Durable Key-Value Map Abstraction
//!
//! A flat, typed preference map with explicit presence and atomic edit batches.

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Typed value held under one preference key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrefValue {
    Float(f32),
    Double(f64),
    Long(i64),
    Int(i32),
    String(String),
    StringSet(BTreeSet<String>),
}

impl PrefValue {
    /// Name of the value's type, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PrefValue::Float(_) => "float",
            PrefValue::Double(_) => "double",
            PrefValue::Long(_) => "long",
            PrefValue::Int(_) => "int",
            PrefValue::String(_) => "string",
            PrefValue::StringSet(_) => "string set",
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PrefValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrefValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrefValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PrefValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_string_set(self) -> Option<BTreeSet<String>> {
        match self {
            PrefValue::StringSet(v) => Some(v),
            _ => None,
        }
    }
}

/// A single mutation inside an [`EditBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Put { key: String, value: PrefValue },
    Remove { key: String },
    /// Add a member to the string set at `key`, creating the set if absent
    InsertIntoSet { key: String, member: String },
    /// Drop a member from the string set at `key`; absent set is a no-op
    RemoveFromSet { key: String, member: String },
}

/// Ordered group of edits committed as one durable unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditBatch {
    edits: Vec<Edit>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: impl Into<String>, value: PrefValue) -> Self {
        self.edits.push(Edit::Put {
            key: key.into(),
            value,
        });
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.edits.push(Edit::Remove { key: key.into() });
        self
    }

    pub fn insert_into_set(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.edits.push(Edit::InsertIntoSet {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn remove_from_set(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.edits.push(Edit::RemoveFromSet {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn into_edits(self) -> Vec<Edit> {
        self.edits
    }
}

/// Durable typed key-value map
///
/// Implementations must apply a whole [`EditBatch`] or none of it, and must
/// evaluate set edits against the state seen inside the same commit.
#[allow(async_fn_in_trait)]
pub trait Preferences {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, StorageError>;

    /// Whether a value is stored under `key`
    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Apply every edit in `batch` atomically
    async fn commit(&self, batch: EditBatch) -> Result<(), StorageError>;
}

/// Apply a set edit to the current value at `key`
///
/// Returns `None` when the set is absent and nothing needs writing.
pub(crate) fn apply_set_edit(
    key: &str,
    current: Option<PrefValue>,
    member: &str,
    insert: bool,
) -> Result<Option<BTreeSet<String>>, StorageError> {
    let mut set = match current {
        None if insert => BTreeSet::new(),
        None => return Ok(None),
        Some(PrefValue::StringSet(set)) => set,
        Some(other) => {
            return Err(StorageError::TypeMismatch {
                key: key.to_string(),
                expected: "string set",
                found: other.kind(),
            })
        }
    };

    if insert {
        set.insert(member.to_string());
    } else {
        set.remove(member);
    }
    Ok(Some(set))
}
