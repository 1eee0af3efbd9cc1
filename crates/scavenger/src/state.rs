//! Application State
//!
//! The in-memory fence list and current location, with the user actions that
//! change them. Every action that changes the list commits to the store first.

use crate::error::AppError;
use geofence::{Expiration, FenceRecord, Location, TransitionType};
use rand::Rng;
use storage::{FenceStore, Preferences};
use tracing::{debug, info, warn};

/// Upper bound (exclusive) for generated message ids
const MESSAGE_ID_BOUND: u32 = 999_999_999;

/// Application state shared by the front end
pub struct AppState<P> {
    store: FenceStore<P>,
    fences: Vec<FenceRecord>,
    location: Option<Location>,
    default_radius_meters: f32,
}

impl<P: Preferences> AppState<P> {
    /// Create state with an empty list and no location fix
    pub fn new(store: FenceStore<P>, default_radius_meters: f32) -> Self {
        Self {
            store,
            fences: Vec::new(),
            location: None,
            default_radius_meters,
        }
    }

    pub fn store(&self) -> &FenceStore<P> {
        &self.store
    }

    /// Fences in display order
    pub fn fences(&self) -> &[FenceRecord] {
        &self.fences
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Status line for the current location
    pub fn location_label(&self) -> String {
        match self.location {
            Some(location) => format!("Location: {}", location),
            None => "Location: Unavailable".to_string(),
        }
    }

    /// Record a location update
    pub fn on_location_changed(&mut self, location: Location) {
        debug!("Location update: {}", location);
        self.location = Some(location);
    }

    /// Replace the list with every complete fence in the store
    pub async fn restore(&mut self) -> Result<usize, AppError> {
        self.fences = self.store.load_all().await?;
        info!("Restored {} fences", self.fences.len());
        Ok(self.fences.len())
    }

    /// Mark a fence at the current location using the thread RNG
    pub async fn mark(&mut self) -> Result<&FenceRecord, AppError> {
        let record = {
            let mut rng = rand::thread_rng();
            self.new_fence(&mut rng, self.default_radius_meters)?
        };
        self.commit_new(record).await
    }

    /// Mark a fence with an explicit RNG and radius
    pub async fn mark_with<R: Rng>(
        &mut self,
        rng: &mut R,
        radius_meters: f32,
    ) -> Result<&FenceRecord, AppError> {
        let record = self.new_fence(rng, radius_meters)?;
        self.commit_new(record).await
    }

    /// Show and remove the fence at `index`, returning its message id
    pub async fn select(&mut self, index: usize) -> Result<String, AppError> {
        let len = self.fences.len();
        let id = match self.fences.get(index) {
            Some(fence) => fence.id.clone(),
            None => return Err(AppError::IndexOutOfRange { index, len }),
        };

        self.store.clear(&id).await?;
        let fence = self.fences.remove(index);
        info!("Removed fence {} (message {})", fence.id, fence.message_id);
        Ok(fence.message_id)
    }

    /// Remove a fence by id; returns whether it was listed
    pub async fn remove(&mut self, id: &str) -> Result<bool, AppError> {
        self.store.clear(id).await?;
        let before = self.fences.len();
        self.fences.retain(|fence| fence.id != id);
        Ok(self.fences.len() != before)
    }

    /// Write every listed fence back to the store
    pub async fn persist_all(&self) -> Result<usize, AppError> {
        Ok(self.store.put_all(&self.fences).await?)
    }

    fn new_fence<R: Rng>(&self, rng: &mut R, radius_meters: f32) -> Result<FenceRecord, AppError> {
        let location = self.location.ok_or(AppError::LocationUnavailable)?;

        let id = loop {
            let candidate = format!("fence.{}", rng.gen::<u32>());
            if !self.fences.iter().any(|fence| fence.id == candidate) {
                break candidate;
            }
        };
        let message_id = rng.gen_range(0..MESSAGE_ID_BOUND).to_string();

        Ok(FenceRecord::builder(id, location)
            .radius_meters(radius_meters)
            .expiration(Expiration::Never)
            .transition_type(TransitionType::ENTER)
            .message_id(message_id)
            .build()?)
    }

    async fn commit_new(&mut self, record: FenceRecord) -> Result<&FenceRecord, AppError> {
        if let Err(e) = self.store.put(&record.id, &record).await {
            warn!("Failed to persist fence {}: {}", record.id, e);
            return Err(e.into());
        }

        info!("Marked fence {}", record);
        self.fences.push(record);
        let index = self.fences.len() - 1;
        Ok(&self.fences[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use storage::{MemoryPreferences, StorageError};

    fn state() -> AppState<MemoryPreferences> {
        AppState::new(FenceStore::new(Arc::new(MemoryPreferences::new())), 100.0)
    }

    #[test]
    fn test_location_label() {
        let mut state = state();
        assert_eq!(state.location_label(), "Location: Unavailable");

        state.on_location_changed(Location::new(37.4219, -122.0841));
        assert_eq!(state.location_label(), "Location: 37.42, -122.08");
    }

    #[tokio::test]
    async fn test_mark_without_location_fails() {
        let mut state = state();
        assert!(matches!(
            state.mark().await,
            Err(AppError::LocationUnavailable)
        ));
        assert!(state.fences().is_empty());
        assert!(state.store().stored_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_persists_fence() {
        let mut state = state();
        state.on_location_changed(Location::new(37.42, -122.08));

        let mut rng = StdRng::seed_from_u64(7);
        let fence = state.mark_with(&mut rng, 100.0).await.unwrap().clone();

        assert!(fence.id.starts_with("fence."));
        assert!(fence.message_id.parse::<u32>().unwrap() < MESSAGE_ID_BOUND);
        assert_eq!(fence.expiration, Expiration::Never);
        assert_eq!(fence.transition_type, TransitionType::ENTER);
        assert_eq!(state.fences().len(), 1);
        assert_eq!(state.store().get(&fence.id).await.unwrap(), Some(fence));
    }

    #[tokio::test]
    async fn test_mark_failure_keeps_list_unchanged() {
        let mut state = state();
        state.on_location_changed(Location::new(1.0, 2.0));
        state.store().preferences().set_read_only(true);

        let result = state.mark().await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::CommitFailed(_)))
        ));
        assert!(state.fences().is_empty());
    }

    #[tokio::test]
    async fn test_select_returns_message_and_removes() {
        let mut state = state();
        state.on_location_changed(Location::new(10.0, 20.0));
        let id = state.mark().await.unwrap().id.clone();
        let message = state.fences()[0].message_id.clone();

        assert_eq!(state.select(0).await.unwrap(), message);
        assert!(state.fences().is_empty());
        assert_eq!(state.store().get(&id).await.unwrap(), None);

        assert!(matches!(
            state.select(0).await,
            Err(AppError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let prefs = Arc::new(MemoryPreferences::new());

        let mut first = AppState::new(FenceStore::new(Arc::clone(&prefs)), 100.0);
        first.on_location_changed(Location::new(-33.87, 151.21));
        first.mark().await.unwrap();
        first.mark().await.unwrap();
        first.persist_all().await.unwrap();

        let mut second = AppState::new(FenceStore::new(prefs), 100.0);
        assert_eq!(second.restore().await.unwrap(), 2);

        let mut restored: Vec<_> = second.fences().iter().map(|f| f.id.clone()).collect();
        let mut marked: Vec<_> = first.fences().iter().map(|f| f.id.clone()).collect();
        restored.sort();
        marked.sort();
        assert_eq!(restored, marked);
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let mut state = state();
        state.on_location_changed(Location::new(0.5, 0.5));
        let id = state.mark().await.unwrap().id.clone();

        assert!(state.remove(&id).await.unwrap());
        assert!(!state.remove(&id).await.unwrap());
        assert!(state.store().stored_ids().await.unwrap().is_empty());
    }
}
