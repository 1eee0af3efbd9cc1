//! Storage Layer
//!
//! Durable preference map backends and the geofence store built on them.

mod fence_store;
mod memory;
mod preferences;
mod sqlite;

pub use fence_store::{field_key, FenceField, FenceStore, ID_INDEX_KEY, KEY_PREFIX};
pub use memory::MemoryPreferences;
pub use preferences::{Edit, EditBatch, PrefValue, Preferences};
pub use sqlite::SqlitePreferences;

use geofence::ValidationError;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Commit failed: {0}")]
    CommitFailed(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Type mismatch at {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}
