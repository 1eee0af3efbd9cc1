//! Geofence Store Implementation
//!
//! Flattens each [`FenceRecord`] into one preference key per field and keeps
//! a separate index of every stored id.

use crate::preferences::{EditBatch, PrefValue, Preferences};
use crate::StorageError;
use geofence::{Expiration, FenceRecord, Location, TransitionType, ValidationError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespace for per-field keys
pub const KEY_PREFIX: &str = "scavenger.geofence.KEY_";

/// Key holding the set of stored fence ids
pub const ID_INDEX_KEY: &str = "FENCELIST_LIST";

/// Persisted fields of a fence record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceField {
    Latitude,
    Longitude,
    Radius,
    ExpirationDuration,
    TransitionType,
    MessageId,
}

impl FenceField {
    pub const ALL: [FenceField; 6] = [
        FenceField::Latitude,
        FenceField::Longitude,
        FenceField::Radius,
        FenceField::ExpirationDuration,
        FenceField::TransitionType,
        FenceField::MessageId,
    ];

    /// Suffix used in the storage key
    pub fn name(self) -> &'static str {
        match self {
            FenceField::Latitude => "LATITUDE",
            FenceField::Longitude => "LONGITUDE",
            FenceField::Radius => "RADIUS",
            FenceField::ExpirationDuration => "EXPIRATION_DURATION",
            FenceField::TransitionType => "TRANSITION_TYPE",
            FenceField::MessageId => "MSGID",
        }
    }

    fn expected_kind(self) -> &'static str {
        match self {
            FenceField::Latitude | FenceField::Longitude => "double",
            FenceField::Radius => "float",
            FenceField::ExpirationDuration => "long",
            FenceField::TransitionType => "int",
            FenceField::MessageId => "string",
        }
    }
}

/// Storage key for one field of one fence: `PREFIX + id + "_" + FIELD`
pub fn field_key(id: &str, field: FenceField) -> String {
    format!("{}{}_{}", KEY_PREFIX, id, field.name())
}

/// Durable CRUD for fence records over a preference map
pub struct FenceStore<P> {
    prefs: Arc<P>,
}

impl<P> Clone for FenceStore<P> {
    fn clone(&self) -> Self {
        Self {
            prefs: Arc::clone(&self.prefs),
        }
    }
}

impl<P: Preferences> FenceStore<P> {
    /// Wrap a preference map
    pub fn new(prefs: Arc<P>) -> Self {
        info!("Creating fence store");
        Self { prefs }
    }

    /// Underlying preference map
    pub fn preferences(&self) -> &P {
        &self.prefs
    }

    /// Every stored fence id; empty when nothing was ever stored
    pub async fn stored_ids(&self) -> Result<BTreeSet<String>, StorageError> {
        match self.prefs.get(ID_INDEX_KEY).await? {
            None => Ok(BTreeSet::new()),
            Some(PrefValue::StringSet(ids)) => Ok(ids),
            Some(other) => Err(StorageError::TypeMismatch {
                key: ID_INDEX_KEY.to_string(),
                expected: "string set",
                found: other.kind(),
            }),
        }
    }

    /// Read a fence; `None` if any of its fields is missing
    pub async fn get(&self, id: &str) -> Result<Option<FenceRecord>, StorageError> {
        let mut values = Vec::with_capacity(FenceField::ALL.len());
        for field in FenceField::ALL {
            match self.prefs.get(&field_key(id, field)).await? {
                Some(value) => values.push(value),
                None => {
                    debug!("Fence {} missing field {}", id, field.name());
                    return Ok(None);
                }
            }
        }

        let latitude = typed(id, FenceField::Latitude, &values[0], PrefValue::as_f64)?;
        let longitude = typed(id, FenceField::Longitude, &values[1], PrefValue::as_f64)?;
        let radius = typed(id, FenceField::Radius, &values[2], PrefValue::as_f32)?;
        let expiration_ms =
            typed(id, FenceField::ExpirationDuration, &values[3], PrefValue::as_i64)?;
        let transition = typed(id, FenceField::TransitionType, &values[4], PrefValue::as_i32)?;
        let message_id = typed(id, FenceField::MessageId, &values[5], |v| {
            v.as_str().map(str::to_string)
        })?;

        Ok(Some(FenceRecord {
            id: id.to_string(),
            latitude,
            longitude,
            radius_meters: radius,
            expiration: Expiration::from_millis(expiration_ms)?,
            transition_type: TransitionType::from_bits(transition),
            message_id,
        }))
    }

    /// Write all six fields and register `id` in the index, in one commit
    pub async fn put(&self, id: &str, record: &FenceRecord) -> Result<(), StorageError> {
        if id.is_empty() {
            return Err(ValidationError::MissingField("id").into());
        }
        record.validate()?;
        if id != record.id {
            warn!("Storing fence {} under different id {}", record.id, id);
        }

        let batch = EditBatch::new()
            .put(
                field_key(id, FenceField::Latitude),
                PrefValue::Double(record.latitude),
            )
            .put(
                field_key(id, FenceField::Longitude),
                PrefValue::Double(record.longitude),
            )
            .put(
                field_key(id, FenceField::Radius),
                PrefValue::Float(record.radius_meters),
            )
            .put(
                field_key(id, FenceField::ExpirationDuration),
                PrefValue::Long(record.expiration.as_millis()?),
            )
            .put(
                field_key(id, FenceField::TransitionType),
                PrefValue::Int(record.transition_type.bits()),
            )
            .put(
                field_key(id, FenceField::MessageId),
                PrefValue::String(record.message_id.clone()),
            )
            .insert_into_set(ID_INDEX_KEY, id);

        self.prefs.commit(batch).await?;
        debug!("Stored fence {}", id);
        Ok(())
    }

    /// Drop `id` from the index and remove its fields; unknown ids are a no-op
    pub async fn clear(&self, id: &str) -> Result<(), StorageError> {
        let batch = FenceField::ALL.into_iter().fold(
            EditBatch::new().remove_from_set(ID_INDEX_KEY, id),
            |batch, field| batch.remove(field_key(id, field)),
        );

        self.prefs.commit(batch).await?;
        debug!("Cleared fence {}", id);
        Ok(())
    }

    /// Load every indexed fence
    ///
    /// Incomplete fences are dropped from the index along with any leftover
    /// fields, since `put` always writes all six at once.
    pub async fn load_all(&self) -> Result<Vec<FenceRecord>, StorageError> {
        let ids = self.stored_ids().await?;
        let mut records = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.get(id).await? {
                Some(record) => records.push(record),
                None => {
                    warn!("Indexed fence {} is incomplete, pruning", id);
                    self.clear(id).await?;
                }
            }
        }

        info!("Loaded {} of {} indexed fences", records.len(), ids.len());
        Ok(records)
    }

    /// Persist each record as its own commit
    pub async fn put_all<'a, I>(&self, records: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a FenceRecord>,
    {
        let mut written = 0;
        for record in records {
            self.put(&record.id, record).await?;
            written += 1;
        }
        debug!("Persisted {} fences", written);
        Ok(written)
    }

    /// Convenience for callers holding only a location
    pub async fn get_location(&self, id: &str) -> Result<Option<Location>, StorageError> {
        Ok(self.get(id).await?.map(|record| record.location()))
    }
}

fn typed<T>(
    id: &str,
    field: FenceField,
    value: &PrefValue,
    extract: impl Fn(&PrefValue) -> Option<T>,
) -> Result<T, StorageError> {
    extract(value).ok_or_else(|| StorageError::TypeMismatch {
        key: field_key(id, field),
        expected: field.expected_kind(),
        found: value.kind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryPreferences;
    use proptest::prelude::*;
    use std::time::Duration;

    fn store() -> FenceStore<MemoryPreferences> {
        FenceStore::new(Arc::new(MemoryPreferences::new()))
    }

    fn sample(id: &str) -> FenceRecord {
        FenceRecord::builder(id, Location::new(37.42, -122.08))
            .radius_meters(100.0)
            .expiration(Expiration::Never)
            .transition_type(TransitionType::ENTER)
            .message_id("42")
            .build()
            .unwrap()
    }

    #[test]
    fn test_field_key_layout() {
        assert_eq!(
            field_key("f1", FenceField::Latitude),
            "scavenger.geofence.KEY_f1_LATITUDE"
        );
        assert_eq!(
            field_key("f1", FenceField::MessageId),
            "scavenger.geofence.KEY_f1_MSGID"
        );
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let store = store();
        let fence = sample("f1");

        store.put("f1", &fence).await.unwrap();
        assert_eq!(
            store.stored_ids().await.unwrap(),
            BTreeSet::from(["f1".to_string()])
        );
        assert_eq!(store.get("f1").await.unwrap(), Some(fence));

        store.clear("f1").await.unwrap();
        assert!(store.stored_ids().await.unwrap().is_empty());
        assert_eq!(store.get("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = store();
        assert!(store.stored_ids().await.unwrap().is_empty());
        assert_eq!(store.get("nope").await.unwrap(), None);
        store.clear("nope").await.unwrap();
        assert!(store.preferences().is_empty());
    }

    #[tokio::test]
    async fn test_clear_leaves_no_residue() {
        let store = store();
        store.put("f1", &sample("f1")).await.unwrap();
        store.clear("f1").await.unwrap();

        for field in FenceField::ALL {
            assert!(!store
                .preferences()
                .contains(&field_key("f1", field))
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_partial_record_not_returned() {
        let store = store();
        store.put("f1", &sample("f1")).await.unwrap();

        store
            .preferences()
            .commit(EditBatch::new().remove(field_key("f1", FenceField::Radius)))
            .await
            .unwrap();

        assert_eq!(store.get("f1").await.unwrap(), None);
        assert!(store.load_all().await.unwrap().is_empty());

        // Loading prunes the broken entry and its remaining fields
        assert!(store.stored_ids().await.unwrap().is_empty());
        assert!(!store
            .preferences()
            .contains(&field_key("f1", FenceField::Latitude))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_load_all_keeps_complete_fences() {
        let store = store();
        store.put("good", &sample("good")).await.unwrap();
        store.put("bad", &sample("bad")).await.unwrap();
        store
            .preferences()
            .commit(EditBatch::new().remove(field_key("bad", FenceField::MessageId)))
            .await
            .unwrap();

        assert_eq!(store.load_all().await.unwrap(), vec![sample("good")]);
        assert_eq!(
            store.stored_ids().await.unwrap(),
            BTreeSet::from(["good".to_string()])
        );
    }

    #[tokio::test]
    async fn test_put_rejects_unencodable_expiration() {
        let store = store();
        let mut fence = sample("f1");
        fence.expiration = Expiration::After(Duration::MAX);

        assert!(matches!(
            store.put("f1", &fence).await,
            Err(StorageError::Invalid(ValidationError::InvalidExpiration(_)))
        ));
        assert!(store.stored_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_put_and_clear() {
        let store = store();
        let fence = sample("f1");

        store.put("f1", &fence).await.unwrap();
        let once = store.preferences().keys();
        store.put("f1", &fence).await.unwrap();
        assert_eq!(store.preferences().keys(), once);
        assert_eq!(store.stored_ids().await.unwrap().len(), 1);

        store.clear("f1").await.unwrap();
        let cleared = store.preferences().keys();
        store.clear("f1").await.unwrap();
        assert_eq!(store.preferences().keys(), cleared);
    }

    #[tokio::test]
    async fn test_clear_keeps_other_fences() {
        let store = store();
        store.put("f1", &sample("f1")).await.unwrap();
        store.put("f2", &sample("f2")).await.unwrap();

        store.clear("f1").await.unwrap();
        assert_eq!(
            store.stored_ids().await.unwrap(),
            BTreeSet::from(["f2".to_string()])
        );
        assert!(store.get("f2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_input() {
        let store = store();
        let mut fence = sample("f1");

        assert!(matches!(
            store.put("", &fence).await,
            Err(StorageError::Invalid(ValidationError::MissingField("id")))
        ));

        fence.radius_meters = -1.0;
        assert!(matches!(
            store.put("f1", &fence).await,
            Err(StorageError::Invalid(ValidationError::NonPositiveRadius(_)))
        ));
        assert!(store.stored_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_propagates() {
        let store = store();
        store.preferences().set_read_only(true);

        let result = store.put("f1", &sample("f1")).await;
        assert!(matches!(result, Err(StorageError::CommitFailed(_))));
        assert!(store.stored_ids().await.unwrap().is_empty());
        assert_eq!(store.get("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let store = store();
        store.put("f1", &sample("f1")).await.unwrap();
        store
            .preferences()
            .commit(EditBatch::new().put(
                field_key("f1", FenceField::Latitude),
                PrefValue::String("north".into()),
            ))
            .await
            .unwrap();

        assert!(matches!(
            store.get("f1").await,
            Err(StorageError::TypeMismatch { expected: "double", .. })
        ));
    }

    #[tokio::test]
    async fn test_load_and_put_all() {
        let store = store();
        let fences = vec![sample("a"), sample("b"), sample("c")];

        assert_eq!(store.put_all(&fences).await.unwrap(), 3);
        assert_eq!(store.load_all().await.unwrap(), fences);
    }

    #[tokio::test]
    async fn test_sqlite_backend_round_trip() {
        let prefs = crate::SqlitePreferences::in_memory().await.unwrap();
        let store = FenceStore::new(Arc::new(prefs));
        let fence = FenceRecord::builder("f9", Location::new(-33.8688, 151.2093))
            .radius_meters(250.5)
            .expiration(Expiration::After(Duration::from_secs(86_400)))
            .transition_type(TransitionType::ENTER | TransitionType::EXIT)
            .message_id("123456789")
            .build()
            .unwrap();

        store.put("f9", &fence).await.unwrap();
        assert_eq!(store.get("f9").await.unwrap(), Some(fence));
        assert_eq!(
            store.get_location("f9").await.unwrap(),
            Some(Location::new(-33.8688, 151.2093))
        );

        store.clear("f9").await.unwrap();
        assert_eq!(store.get("f9").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_and_clear_on_pooled_file() {
        let path = std::env::temp_dir().join(format!(
            "scavenger-concurrent-{}-{}.db",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        let prefs = crate::SqlitePreferences::open(&path, 8).await.unwrap();
        let store = Arc::new(FenceStore::new(Arc::new(prefs)));

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let keep = format!("keep.{}", i);
                let gone = format!("drop.{}", i);
                store.put(&keep, &sample(&keep)).await?;
                store.put(&gone, &sample(&gone)).await?;
                store.clear("shared").await?;
                store.clear(&gone).await?;
                store.put(&keep, &sample(&keep)).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let expected: BTreeSet<String> = (0..64).map(|i| format!("keep.{}", i)).collect();
        assert_eq!(store.stored_ids().await.unwrap(), expected);
        for id in &expected {
            assert_eq!(store.get(id).await.unwrap(), Some(sample(id)));
        }
        assert_eq!(store.get("drop.0").await.unwrap(), None);

        store.preferences().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    proptest! {
        #[test]
        fn prop_put_then_get_round_trips(
            id in "[a-z0-9.]{1,16}",
            lat in -90.0f64..=90.0,
            lng in -180.0f64..=180.0,
            radius in 0.5f32..10_000.0,
            expiration_ms in prop_oneof![Just(-1i64), 0i64..1_000_000_000],
            transition in 1i32..8,
            message in "[0-9]{0,9}",
        ) {
            let fence = FenceRecord {
                id: id.clone(),
                latitude: lat,
                longitude: lng,
                radius_meters: radius,
                expiration: Expiration::from_millis(expiration_ms).unwrap(),
                transition_type: TransitionType::from_bits(transition),
                message_id: message,
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let loaded = runtime.block_on(async {
                let store = store();
                store.put(&id, &fence).await.unwrap();
                store.get(&id).await.unwrap()
            });

            prop_assert_eq!(loaded, Some(fence));
        }
    }
}
