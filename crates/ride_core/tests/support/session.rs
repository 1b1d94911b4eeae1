use std::sync::Arc;

use ride_core::config::SessionConfig;
use ride_core::location::{LocationFix, LocationUpdate};
use ride_core::routing::RouteProvider;
use ride_core::session::{spawn_session, Collaborators, SessionHandle};
use ride_core::store::{KeyValueStore, MemoryStore};
use ride_core::test_helpers::{
    test_center, RecordingLocationProvider, RecordingPlaceSearch, SpreadRouteProvider,
};
use tokio::task::JoinHandle;

/// A running session plus the stubs behind it.
pub struct TestSession {
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub places: Arc<RecordingPlaceSearch>,
    pub location: Arc<RecordingLocationProvider>,
    pub store: Arc<dyn KeyValueStore>,
}

impl TestSession {
    pub fn send_fix(&self) {
        self.handle
            .location_update(LocationUpdate::Fix(LocationFix::at(test_center())))
            .expect("session should accept location updates");
    }
}

/// Builder for sessions wired to deterministic stubs.
pub struct TestSessionBuilder {
    config: SessionConfig,
    routes: Arc<dyn RouteProvider>,
    places: Arc<RecordingPlaceSearch>,
    store: Arc<dyn KeyValueStore>,
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default()
                .with_fleet_seed(7)
                .with_animator_seed(11),
            routes: Arc::new(SpreadRouteProvider::new(60.0)),
            places: Arc::new(RecordingPlaceSearch::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl TestSessionBuilder {
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteProvider>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_places(mut self, places: RecordingPlaceSearch) -> Self {
        self.places = Arc::new(places);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn spawn(self) -> TestSession {
        let location = Arc::new(RecordingLocationProvider::default());
        let collaborators = Collaborators {
            routes: self.routes,
            places: self.places.clone(),
            location: location.clone(),
            store: Arc::clone(&self.store),
        };
        let (handle, task) = spawn_session(self.config, collaborators);
        TestSession {
            handle,
            task,
            places: self.places,
            location,
            store: self.store,
        }
    }
}
