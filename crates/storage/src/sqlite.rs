//! SQLite Preference Backend
//!
//! One row per key, values encoded with postcard. Each commit is one SQL
//! transaction on a dedicated single-connection writer pool, so concurrent
//! commits queue for the writer instead of racing to upgrade read locks.

use crate::preferences::{apply_set_edit, Edit, EditBatch, PrefValue, Preferences};
use crate::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
)";

/// How long a commit waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Preference map stored in a SQLite database
pub struct SqlitePreferences {
    /// Point reads
    readers: SqlitePool,
    /// Exactly one connection; every commit runs here
    writer: SqlitePool,
}

impl SqlitePreferences {
    /// Open (creating if needed) a database file
    ///
    /// `max_connections` sizes the read pool; writes always use one connection.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StorageError> {
        let path = path.as_ref();
        info!("Opening SQLite preferences at {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::query(CREATE_TABLE).execute(&writer).await?;

        let readers = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Ok(Self { readers, writer })
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self, StorageError> {
        info!("Opening in-memory SQLite preferences");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection sees its own memory database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        Ok(Self {
            readers: pool.clone(),
            writer: pool,
        })
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.readers.close().await;
        self.writer.close().await;
    }

    async fn read_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
    ) -> Result<Option<PrefValue>, StorageError> {
        let raw: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;

        raw.map(|bytes| decode(&bytes)).transpose()
    }

    async fn write_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        value: &PrefValue,
    ) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(value)?;
        sqlx::query(
            "INSERT INTO preferences (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(bytes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn delete_in_tx(tx: &mut Transaction<'_, Sqlite>, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn set_edit_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        member: &str,
        insert: bool,
    ) -> Result<(), StorageError> {
        let current = Self::read_in_tx(tx, key).await?;
        if let Some(set) = apply_set_edit(key, current, member, insert)? {
            Self::write_in_tx(tx, key, &PrefValue::StringSet(set)).await?;
        }
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<PrefValue, StorageError> {
    Ok(postcard::from_bytes(bytes)?)
}

impl Preferences for SqlitePreferences {
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, StorageError> {
        let raw: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.readers)
                .await?;

        raw.map(|bytes| decode(&bytes)).transpose()
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.readers)
            .await?;
        Ok(found.is_some())
    }

    async fn commit(&self, batch: EditBatch) -> Result<(), StorageError> {
        let edit_count = batch.len();
        let mut tx = self.writer.begin().await?;

        // Dropping `tx` on an early return rolls the whole batch back
        for edit in batch.into_edits() {
            match edit {
                Edit::Put { key, value } => Self::write_in_tx(&mut tx, &key, &value).await?,
                Edit::Remove { key } => Self::delete_in_tx(&mut tx, &key).await?,
                Edit::InsertIntoSet { key, member } => {
                    Self::set_edit_in_tx(&mut tx, &key, &member, true).await?
                }
                Edit::RemoveFromSet { key, member } => {
                    Self::set_edit_in_tx(&mut tx, &key, &member, false).await?
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;

        debug!("Committed {} edits to SQLite preferences", edit_count);
        Ok(())
    }
}
