//! Recent searches and favorite places, persisted through a [`KeyValueStore`].
//!
//! Store failures never reach the caller: the in-memory lists stay
//! authoritative and the failure is logged.

use std::sync::Arc;

use crate::places::Place;
use crate::store::{load_records, save_records, KeyValueStore};

pub const RECENTS_KEY: &str = "recent_searches";
pub const FAVORITES_KEY: &str = "favorites";

pub struct SavedPlaces {
    store: Arc<dyn KeyValueStore>,
    max_recents: usize,
    recents: Vec<Place>,
    favorites: Vec<Place>,
}

impl SavedPlaces {
    /// Load both lists from `store`. Unreadable lists start empty.
    pub fn load(store: Arc<dyn KeyValueStore>, max_recents: usize) -> Self {
        let mut recents: Vec<Place> =
            load_records(store.as_ref(), RECENTS_KEY).unwrap_or_else(|error| {
                log::warn!("failed to load recent searches: {error}");
                Vec::new()
            });
        recents.retain(|place| !place.is_my_location());
        recents.truncate(max_recents);

        let favorites = load_records(store.as_ref(), FAVORITES_KEY).unwrap_or_else(|error| {
            log::warn!("failed to load favorites: {error}");
            Vec::new()
        });

        Self {
            store,
            max_recents,
            recents,
            favorites,
        }
    }

    pub fn recents(&self) -> &[Place] {
        &self.recents
    }

    pub fn favorites(&self) -> &[Place] {
        &self.favorites
    }

    /// Move `place` to the front of the recents. Returns false when the place
    /// is the user's own location, which is never recorded.
    pub fn record_recent(&mut self, place: &Place) -> bool {
        if place.is_my_location() {
            return false;
        }
        self.recents.retain(|existing| existing.id != place.id);
        self.recents.insert(0, place.clone());
        self.recents.truncate(self.max_recents);
        self.persist(RECENTS_KEY, &self.recents);
        true
    }

    pub fn clear_recents(&mut self) {
        self.recents.clear();
        if let Err(error) = self.store.remove(RECENTS_KEY) {
            log::warn!("failed to clear recent searches: {error}");
        }
    }

    /// Add `place` to the front of the favorites, or remove it if present.
    /// Returns whether the place is a favorite afterwards.
    pub fn toggle_favorite(&mut self, place: &Place) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|existing| existing.id != place.id);
        let now_favorite = self.favorites.len() == before;
        if now_favorite {
            self.favorites.insert(0, place.clone());
        }
        self.persist(FAVORITES_KEY, &self.favorites);
        now_favorite
    }

    pub fn is_favorite(&self, place: &Place) -> bool {
        self.favorites.iter().any(|existing| existing.id == place.id)
    }

    fn persist(&self, key: &str, places: &[Place]) {
        if let Err(error) = save_records(self.store.as_ref(), key, places) {
            log::warn!("failed to persist '{key}': {error}");
        }
    }
}
