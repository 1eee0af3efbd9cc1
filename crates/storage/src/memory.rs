//! In-Memory Preference Backend

use crate::preferences::{apply_set_edit, Edit, EditBatch, PrefValue, Preferences};
use crate::StorageError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// Preference map held in process memory
///
/// Commits are staged on a copy and swapped in under one lock, so a failing
/// edit leaves the map untouched.
pub struct MemoryPreferences {
    entries: Mutex<HashMap<String, PrefValue>>,
    /// Reject every commit, as a full or read-only disk would
    read_only: AtomicBool,
}

impl MemoryPreferences {
    /// Create an empty in-memory map
    pub fn new() -> Self {
        info!("Creating in-memory preferences");
        Self {
            entries: Mutex::new(HashMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Toggle commit rejection
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored key, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Default for MemoryPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl Preferences for MemoryPreferences {
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, StorageError> {
        let entries = self.entries.lock().map_err(|e| {
            StorageError::DatabaseError(format!("Lock error: {}", e))
        })?;

        Ok(entries.get(key).cloned())
    }

    async fn commit(&self, batch: EditBatch) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::CommitFailed(
                "preferences are read-only".to_string(),
            ));
        }

        let mut entries = self.entries.lock().map_err(|e| {
            StorageError::DatabaseError(format!("Lock error: {}", e))
        })?;

        let edit_count = batch.len();
        let mut staged = entries.clone();
        for edit in batch.into_edits() {
            match edit {
                Edit::Put { key, value } => {
                    staged.insert(key, value);
                }
                Edit::Remove { key } => {
                    staged.remove(&key);
                }
                Edit::InsertIntoSet { key, member } => {
                    let current = staged.remove(&key);
                    if let Some(set) = apply_set_edit(&key, current, &member, true)? {
                        staged.insert(key, PrefValue::StringSet(set));
                    }
                }
                Edit::RemoveFromSet { key, member } => {
                    let current = staged.remove(&key);
                    if let Some(set) = apply_set_edit(&key, current, &member, false)? {
                        staged.insert(key, PrefValue::StringSet(set));
                    }
                }
            }
        }

        *entries = staged;
        debug!("Committed {} edits to in-memory preferences", edit_count);
        Ok(())
    }
}
