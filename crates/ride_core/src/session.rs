//! The session actor.
//!
//! One task owns every piece of mutable session state: the user location,
//! the fleet, the animator, the current route, the search coordinator, the
//! route draft and the saved places. Callers talk to it through a
//! [`SessionHandle`]; it answers by broadcasting [`SessionEvent`]s.
//!
//! Slow work (fleet generation, routing, search, reverse geocoding) runs in
//! spawned tasks that post their results back to the actor. Route and search
//! results carry a ticket and are dropped if a newer request has started
//! since. Only one fleet generation runs at a time; regeneration requests
//! made while it runs are ignored.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::animation::{VehicleAnimator, VehicleTransition};
use crate::config::SessionConfig;
use crate::draft::{RouteDraft, SearchField};
use crate::error::{DraftError, RoutingError, SearchError, SessionError};
use crate::fleet::{FleetGenerator, Vehicle};
use crate::geo::{BoundingBox, Coordinate};
use crate::location::{
    AuthorizationState, LocationChange, LocationProvider, LocationTracker, LocationUpdate,
    NoopLocationProvider,
};
use crate::places::{NoPlaceSearch, Place, PlaceCandidate, PlaceSearchProvider};
use crate::route::{ComputedRoute, RouteComputer, Waypoint};
use crate::routing::{build_route_provider, RouteProvider};
use crate::saved::SavedPlaces;
use crate::search::{PlaceSearchCoordinator, SearchAction};
use crate::snapping::RoadSnapper;
use crate::store::{KeyValueStore, MemoryStore};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// External services a session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub routes: Arc<dyn RouteProvider>,
    pub places: Arc<dyn PlaceSearchProvider>,
    pub location: Arc<dyn LocationProvider>,
    pub store: Arc<dyn KeyValueStore>,
}

impl Collaborators {
    /// Routing from `config.route_provider`, no place search, no location
    /// permission flow and an in-memory store.
    pub fn from_config(config: &SessionConfig) -> Result<Self, RoutingError> {
        Ok(Self {
            routes: build_route_provider(&config.route_provider)?,
            places: Arc::new(NoPlaceSearch),
            location: Arc::new(NoopLocationProvider),
            store: Arc::new(MemoryStore::new()),
        })
    }
}

#[derive(Debug)]
pub enum SessionCommand {
    Location(LocationUpdate),
    /// Re-centre on the user, or ask for permission if there is no fix yet.
    CenterOnUser,
    RegenerateFleet,
    StartAnimations,
    StopAnimations,
    /// Route to `destination` through `stops`. Without `start` the route
    /// begins at the user's location, waiting for the first fix if needed.
    SetDestination {
        start: Option<Waypoint>,
        stops: Vec<Waypoint>,
        destination: Waypoint,
    },
    /// Route along the current draft.
    RouteDraft,
    ClearRoute,
    SetActiveField(SearchField),
    QueryChanged { field: SearchField, text: String },
    SelectPlace { field: SearchField, place: Place },
    ClearSearchResults,
    ToggleFavorite(Place),
    ClearRecents,
    AddStop,
    RemoveStop(usize),
    SwapEndpoints,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    UserLocationChanged(Coordinate),
    AuthorizationChanged(AuthorizationState),
    CameraCentered(BoundingBox),
    FleetLoading,
    FleetChanged(Vec<Vehicle>),
    VehicleMoved(VehicleTransition),
    AnimationStateChanged { running: bool },
    RouteChanged(ComputedRoute),
    SearchLoading(bool),
    SearchResultsChanged(Vec<Place>),
    DraftChanged(RouteDraft),
    RecentsChanged(Vec<Place>),
    FavoritesChanged(Vec<Place>),
    StopLimitReached { max: usize },
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user_location: Option<Coordinate>,
    pub fleet: Vec<Vehicle>,
    pub animating: bool,
    pub route: ComputedRoute,
    pub search_results: Vec<Place>,
    pub search_loading: bool,
    pub draft: RouteDraft,
    pub recents: Vec<Place>,
    pub favorites: Vec<Place>,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn location_update(&self, update: LocationUpdate) -> Result<(), SessionError> {
        self.send(SessionCommand::Location(update))
    }

    pub fn center_on_user(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::CenterOnUser)
    }

    pub fn regenerate_fleet(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RegenerateFleet)
    }

    pub fn start_animations(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StartAnimations)
    }

    pub fn stop_animations(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StopAnimations)
    }

    pub fn set_destination(
        &self,
        start: Option<Waypoint>,
        stops: Vec<Waypoint>,
        destination: Waypoint,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::SetDestination {
            start,
            stops,
            destination,
        })
    }

    pub fn route_draft(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RouteDraft)
    }

    pub fn clear_route(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ClearRoute)
    }

    pub fn set_active_field(&self, field: SearchField) -> Result<(), SessionError> {
        self.send(SessionCommand::SetActiveField(field))
    }

    pub fn query_changed(
        &self,
        field: SearchField,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::QueryChanged {
            field,
            text: text.into(),
        })
    }

    pub fn select_place(&self, field: SearchField, place: Place) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectPlace { field, place })
    }

    pub fn clear_search_results(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ClearSearchResults)
    }

    pub fn toggle_favorite(&self, place: Place) -> Result<(), SessionError> {
        self.send(SessionCommand::ToggleFavorite(place))
    }

    pub fn clear_recents(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ClearRecents)
    }

    pub fn add_stop(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::AddStop)
    }

    pub fn remove_stop(&self, index: usize) -> Result<(), SessionError> {
        self.send(SessionCommand::RemoveStop(index))
    }

    pub fn swap_endpoints(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::SwapEndpoints)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Snapshot(reply))?;
        response.await.map_err(|_| SessionError::Closed)
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown)
    }
}

/// Start a session on the current tokio runtime.
///
/// The actor stops on [`SessionHandle::shutdown`] or once every handle has
/// been dropped.
pub fn spawn_session(
    config: SessionConfig,
    collaborators: Collaborators,
) -> (SessionHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let actor = SessionActor::new(config, collaborators, events.clone(), internal_tx);
    let task = tokio::spawn(actor.run(command_rx, internal_rx));
    (
        SessionHandle {
            commands: command_tx,
            events,
        },
        task,
    )
}

/// Results posted back to the actor by its background tasks.
enum Internal {
    FleetReady(Vec<Vehicle>),
    RouteReady {
        ticket: u64,
        route: ComputedRoute,
    },
    SearchDone {
        ticket: u64,
        outcome: Result<Vec<PlaceCandidate>, SearchError>,
    },
    AddressResolved {
        coordinate: Coordinate,
        address: Option<String>,
    },
}

enum Step {
    Command(SessionCommand),
    Internal(Internal),
    Tick,
    SearchDue,
    Stop,
}

struct RouteRequest {
    start: Option<Coordinate>,
    stops: Vec<Waypoint>,
    destination: Waypoint,
}

struct SessionActor {
    config: SessionConfig,
    places: Arc<dyn PlaceSearchProvider>,
    location_provider: Arc<dyn LocationProvider>,
    events: broadcast::Sender<SessionEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    location: LocationTracker,

    fleet_generator: Arc<FleetGenerator>,
    fleet: Vec<Vehicle>,
    fleet_task: Option<JoinHandle<()>>,
    animator: VehicleAnimator,

    route_computer: Arc<RouteComputer>,
    route: ComputedRoute,
    route_ticket: u64,
    route_task: Option<JoinHandle<()>>,
    pending_route: Option<RouteRequest>,

    search: PlaceSearchCoordinator,
    saved: SavedPlaces,
    draft: RouteDraft,
    geocode_task: Option<JoinHandle<()>>,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

impl SessionActor {
    fn new(
        config: SessionConfig,
        collaborators: Collaborators,
        events: broadcast::Sender<SessionEvent>,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        let snapper = Arc::new(RoadSnapper::new(Arc::clone(&collaborators.routes)));
        let fleet_generator = Arc::new(FleetGenerator::new(snapper, config.fleet.clone()));
        let route_computer = Arc::new(RouteComputer::new(
            Arc::clone(&collaborators.routes),
            config.route.clone(),
        ));
        let saved = SavedPlaces::load(collaborators.store, config.search.max_recents);

        Self {
            animator: VehicleAnimator::new(config.animator.clone()),
            search: PlaceSearchCoordinator::new(config.search.clone()),
            draft: RouteDraft::new(config.search.max_stops),
            config,
            places: collaborators.places,
            location_provider: collaborators.location,
            events,
            internal_tx,
            location: LocationTracker::default(),
            fleet_generator,
            fleet: Vec::new(),
            fleet_task: None,
            route_computer,
            route: ComputedRoute::default(),
            route_ticket: 0,
            route_task: None,
            pending_route: None,
            saved,
            geocode_task: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.location_provider.request_permission();

        loop {
            let search_deadline = self.search.deadline();
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => Step::Stop,
                    Some(command) => Step::Command(command),
                },
                Some(message) = internal.recv() => Step::Internal(message),
                _ = self.animator.next_tick() => Step::Tick,
                _ = sleep_until_deadline(search_deadline) => Step::SearchDue,
            };

            match step {
                Step::Command(command) => self.handle_command(command),
                Step::Internal(message) => self.handle_internal(message),
                Step::Tick => self.animate(),
                Step::SearchDue => self.fire_search(),
                Step::Stop => break,
            }
        }

        self.shutdown();
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Location(update) => self.apply_location(update),
            SessionCommand::CenterOnUser => match self.location.current() {
                Some(coordinate) => self.center_camera(coordinate),
                None => self.location_provider.request_permission(),
            },
            SessionCommand::RegenerateFleet => match self.location.current() {
                Some(center) => self.schedule_fleet(center, Duration::ZERO),
                None => log::debug!("fleet regeneration requested before the first fix"),
            },
            SessionCommand::StartAnimations => {
                if self.animator.start() {
                    self.emit(SessionEvent::AnimationStateChanged { running: true });
                }
            }
            SessionCommand::StopAnimations => {
                if self.animator.stop() {
                    self.emit(SessionEvent::AnimationStateChanged { running: false });
                }
            }
            SessionCommand::SetDestination {
                start,
                stops,
                destination,
            } => self.request_route(RouteRequest {
                start: start.map(|waypoint| waypoint.coordinate),
                stops,
                destination,
            }),
            SessionCommand::RouteDraft => self.route_from_draft(),
            SessionCommand::ClearRoute => self.clear_route(),
            SessionCommand::SetActiveField(field) => self.search.set_active_field(field),
            SessionCommand::QueryChanged { field, text } => {
                self.search.query_changed(field, text, Instant::now());
            }
            SessionCommand::SelectPlace { field, place } => self.select_place(field, place),
            SessionCommand::ClearSearchResults => {
                self.search.clear_results();
                self.emit(SessionEvent::SearchResultsChanged(Vec::new()));
            }
            SessionCommand::ToggleFavorite(place) => {
                self.saved.toggle_favorite(&place);
                self.emit(SessionEvent::FavoritesChanged(self.saved.favorites().to_vec()));
            }
            SessionCommand::ClearRecents => {
                self.saved.clear_recents();
                self.emit(SessionEvent::RecentsChanged(Vec::new()));
            }
            SessionCommand::AddStop => match self.draft.add_stop() {
                Ok(_) => self.emit(SessionEvent::DraftChanged(self.draft.clone())),
                Err(DraftError::StopLimitReached { max }) => {
                    self.emit(SessionEvent::StopLimitReached { max })
                }
                Err(error) => log::debug!("add stop rejected: {error}"),
            },
            SessionCommand::RemoveStop(index) => match self.draft.remove_stop(index) {
                Ok(_) => self.emit(SessionEvent::DraftChanged(self.draft.clone())),
                Err(error) => log::debug!("remove stop rejected: {error}"),
            },
            SessionCommand::SwapEndpoints => {
                self.draft.swap_endpoints();
                self.emit(SessionEvent::DraftChanged(self.draft.clone()));
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::FleetReady(vehicles) => {
                self.fleet_task = None;
                self.fleet = vehicles;
                self.emit(SessionEvent::FleetChanged(self.fleet.clone()));
                if self.animator.start_after(self.config.animator.settle_delay) {
                    self.emit(SessionEvent::AnimationStateChanged { running: true });
                }
            }
            Internal::RouteReady { ticket, route } => {
                if ticket != self.route_ticket {
                    log::debug!("discarding superseded route {ticket}");
                    return;
                }
                self.route_task = None;
                self.route = route;
                self.emit(SessionEvent::RouteChanged(self.route.clone()));
            }
            Internal::SearchDone { ticket, outcome } => {
                if self.search.complete(ticket, outcome) {
                    self.emit(SessionEvent::SearchLoading(false));
                    self.emit(SessionEvent::SearchResultsChanged(self.search.results().to_vec()));
                }
            }
            Internal::AddressResolved {
                coordinate,
                address,
            } => {
                self.geocode_task = None;
                if let Some(address) = address {
                    if self.draft.name_location_pickup(coordinate, address) {
                        self.emit(SessionEvent::DraftChanged(self.draft.clone()));
                    }
                }
            }
        }
    }

    fn apply_location(&mut self, update: LocationUpdate) {
        match self.location.apply(update) {
            LocationChange::InitialFix(coordinate) => {
                self.emit(SessionEvent::UserLocationChanged(coordinate));
                self.center_camera(coordinate);

                self.draft.set_pickup_to_location(coordinate);
                self.emit(SessionEvent::DraftChanged(self.draft.clone()));
                self.resolve_pickup_address(coordinate);

                self.schedule_fleet(coordinate, self.config.fleet_load_delay);

                if let Some(request) = self.pending_route.take() {
                    self.request_route(request);
                }
            }
            LocationChange::PositionUpdated(coordinate) => {
                self.emit(SessionEvent::UserLocationChanged(coordinate));
            }
            LocationChange::AuthorizationChanged {
                state,
                became_authorized,
            } => {
                self.emit(SessionEvent::AuthorizationChanged(state));
                if became_authorized {
                    self.location_provider.start();
                }
            }
            LocationChange::Unchanged => {}
        }
    }

    fn center_camera(&self, coordinate: Coordinate) {
        self.emit(SessionEvent::CameraCentered(BoundingBox::around(
            coordinate,
            self.config.camera_span_m,
        )));
    }

    fn schedule_fleet(&mut self, center: Coordinate, delay: Duration) {
        if self.fleet_task.is_some() {
            log::debug!("fleet generation already in flight");
            return;
        }
        let generator = Arc::clone(&self.fleet_generator);
        let internal = self.internal_tx.clone();
        let desired = self.config.fleet.desired_count;

        self.emit(SessionEvent::FleetLoading);
        self.fleet_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let vehicles = generator.generate(center, desired).await;
            let _ = internal.send(Internal::FleetReady(vehicles));
        }));
    }

    fn animate(&mut self) {
        for transition in self.animator.tick(&mut self.fleet) {
            self.emit(SessionEvent::VehicleMoved(transition));
        }
    }

    fn request_route(&mut self, request: RouteRequest) {
        // Supersedes any route in flight, even one that has to wait for a fix.
        self.cancel_route_task();
        let Some(start) = request.start.or_else(|| self.location.current()) else {
            log::debug!(
                "route to '{}' waits for the first location fix",
                request.destination.label
            );
            self.pending_route = Some(request);
            if !self.route.is_empty() {
                self.route = ComputedRoute::default();
                self.emit(SessionEvent::RouteChanged(ComputedRoute::default()));
            }
            return;
        };
        self.pending_route = None;

        let ticket = self.route_ticket;
        let computer = Arc::clone(&self.route_computer);
        let internal = self.internal_tx.clone();
        self.route_task = Some(tokio::spawn(async move {
            let route = computer
                .compute_route(start, &request.stops, &request.destination)
                .await;
            let _ = internal.send(Internal::RouteReady { ticket, route });
        }));
    }

    fn route_from_draft(&mut self) {
        let Some(destination) = self.draft.destination.as_ref().map(Place::to_waypoint) else {
            log::debug!("draft has no destination to route to");
            return;
        };
        let start = self
            .draft
            .pickup
            .as_ref()
            .filter(|pickup| !pickup.is_my_location())
            .map(|pickup| pickup.coordinate);
        self.request_route(RouteRequest {
            start,
            stops: self.draft.stop_waypoints(),
            destination,
        });
    }

    /// Abort the running route task and invalidate its result.
    fn cancel_route_task(&mut self) {
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
        self.route_ticket += 1;
    }

    fn clear_route(&mut self) {
        self.cancel_route_task();
        self.pending_route = None;
        self.route = ComputedRoute::default();
        self.emit(SessionEvent::RouteChanged(ComputedRoute::default()));
        if let Some(coordinate) = self.location.current() {
            self.center_camera(coordinate);
        }
    }

    fn resolve_pickup_address(&mut self, coordinate: Coordinate) {
        if let Some(task) = self.geocode_task.take() {
            task.abort();
        }
        let places = Arc::clone(&self.places);
        let internal = self.internal_tx.clone();
        self.geocode_task = Some(tokio::spawn(async move {
            let lookup =
                tokio::task::spawn_blocking(move || places.reverse_geocode(coordinate)).await;
            let address = match lookup {
                Ok(Ok(components)) => components.and_then(|components| components.street_address()),
                Ok(Err(error)) => {
                    log::warn!("reverse geocoding failed: {error}");
                    None
                }
                Err(error) => {
                    log::warn!("reverse geocoding task failed: {error}");
                    None
                }
            };
            let _ = internal.send(Internal::AddressResolved {
                coordinate,
                address,
            });
        }));
    }

    fn fire_search(&mut self) {
        match self.search.fire_due(Instant::now()) {
            SearchAction::None => {}
            SearchAction::Clear => {
                self.emit(SessionEvent::SearchLoading(false));
                self.emit(SessionEvent::SearchResultsChanged(Vec::new()));
            }
            SearchAction::Search { ticket, query } => {
                self.emit(SessionEvent::SearchLoading(true));
                let places = Arc::clone(&self.places);
                let region = self.config.search.bias_region.clone();
                let internal = self.internal_tx.clone();
                let task = tokio::spawn(async move {
                    let lookup =
                        tokio::task::spawn_blocking(move || places.search(&query, &region)).await;
                    let outcome = lookup.unwrap_or_else(|error| {
                        Err(SearchError::Http(format!("search task failed: {error}")))
                    });
                    let _ = internal.send(Internal::SearchDone { ticket, outcome });
                });
                self.search.attach(ticket, task.abort_handle());
            }
        }
    }

    fn select_place(&mut self, field: SearchField, place: Place) {
        if self.draft.select(field, place.clone()) {
            self.emit(SessionEvent::DraftChanged(self.draft.clone()));
        }
        self.search.clear_results();
        self.emit(SessionEvent::SearchResultsChanged(Vec::new()));
        if self.saved.record_recent(&place) {
            self.emit(SessionEvent::RecentsChanged(self.saved.recents().to_vec()));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user_location: self.location.current(),
            fleet: self.fleet.clone(),
            animating: self.animator.is_running(),
            route: self.route.clone(),
            search_results: self.search.results().to_vec(),
            search_loading: self.search.is_loading(),
            draft: self.draft.clone(),
            recents: self.saved.recents().to_vec(),
            favorites: self.saved.favorites().to_vec(),
        }
    }

    fn shutdown(&mut self) {
        self.animator.stop();
        for task in [
            self.fleet_task.take(),
            self.route_task.take(),
            self.geocode_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        self.search.cancel_in_flight();
        self.location_provider.stop();
        log::info!("session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationFix;
    use crate::test_helpers::{
        candidate, test_center, RecordingLocationProvider, RecordingPlaceSearch,
        SpreadRouteProvider,
    };

    fn collaborators(
        places: Arc<RecordingPlaceSearch>,
        location: Arc<RecordingLocationProvider>,
    ) -> Collaborators {
        Collaborators {
            routes: Arc::new(SpreadRouteProvider::new(60.0)),
            places,
            location,
            store: Arc::new(MemoryStore::new()),
        }
    }

    #[tokio::test]
    async fn shutdown_stops_location_updates() {
        let location = Arc::new(RecordingLocationProvider::default());
        let (handle, task) = spawn_session(
            SessionConfig::default(),
            collaborators(Arc::new(RecordingPlaceSearch::new()), location.clone()),
        );

        handle.shutdown().expect("send");
        task.await.expect("actor finished");

        assert_eq!(location.permission_requests(), 1);
        assert_eq!(location.stops(), 1);
        assert_eq!(handle.shutdown(), Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn authorization_grant_starts_updates() {
        let location = Arc::new(RecordingLocationProvider::default());
        let (handle, _task) = spawn_session(
            SessionConfig::default(),
            collaborators(Arc::new(RecordingPlaceSearch::new()), location.clone()),
        );

        handle
            .location_update(LocationUpdate::Authorization(AuthorizationState::AuthorizedWhenInUse))
            .expect("send");
        handle.snapshot().await.expect("snapshot");
        assert_eq!(location.starts(), 1);
    }

    #[tokio::test]
    async fn center_without_fix_requests_permission() {
        let location = Arc::new(RecordingLocationProvider::default());
        let (handle, _task) = spawn_session(
            SessionConfig::default(),
            collaborators(Arc::new(RecordingPlaceSearch::new()), location.clone()),
        );

        handle.center_on_user().expect("send");
        handle.snapshot().await.expect("snapshot");
        assert_eq!(location.permission_requests(), 2);
    }

    #[tokio::test]
    async fn stop_limit_is_reported() {
        let (handle, _task) = spawn_session(
            SessionConfig::default(),
            collaborators(
                Arc::new(RecordingPlaceSearch::new()),
                Arc::new(RecordingLocationProvider::default()),
            ),
        );
        let mut events = handle.subscribe();

        for _ in 0..4 {
            handle.add_stop().expect("send");
        }
        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.draft.stops.len(), 3);

        let mut limit_events = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::StopLimitReached { max: 3 }) {
                limit_events += 1;
            }
        }
        assert_eq!(limit_events, 1);
    }

    #[tokio::test]
    async fn initial_fix_names_pickup_from_reverse_geocode() {
        let address = crate::places::AddressComponents {
            sub_locality: Some("Sultanahmet".to_string()),
            thoroughfare: Some("Divan Yolu".to_string()),
            sub_thoroughfare: Some("3".to_string()),
            ..Default::default()
        };
        let places = Arc::new(RecordingPlaceSearch::new().with_address(address));
        let (handle, _task) = spawn_session(
            SessionConfig::default(),
            collaborators(places.clone(), Arc::new(RecordingLocationProvider::default())),
        );
        let mut events = handle.subscribe();

        handle
            .location_update(LocationUpdate::Fix(LocationFix::at(test_center())))
            .expect("send");

        let named = loop {
            match events.recv().await {
                Ok(SessionEvent::DraftChanged(draft)) => {
                    let title = draft.pickup.map(|pickup| pickup.title).unwrap_or_default();
                    if title != crate::places::MY_LOCATION_TITLE {
                        break title;
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("session ended"),
            }
        };
        assert_eq!(named, "Sultanahmet, Divan Yolu, No. 3");
        assert_eq!(places.reverse_lookups(), vec![test_center()]);
    }

    #[tokio::test]
    async fn selecting_a_place_records_recent_and_clears_results() {
        let places = Arc::new(
            RecordingPlaceSearch::new().with_results(vec![candidate("Karakoy", test_center())]),
        );
        let (handle, _task) = spawn_session(
            SessionConfig::default(),
            collaborators(places, Arc::new(RecordingLocationProvider::default())),
        );

        let place = Place::new("Karakoy", "Beyoglu", test_center());
        handle
            .select_place(SearchField::Destination, place.clone())
            .expect("send");
        handle.toggle_favorite(place.clone()).expect("send");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.draft.destination, Some(place.clone()));
        assert_eq!(snapshot.recents, vec![place.clone()]);
        assert_eq!(snapshot.favorites, vec![place]);
        assert!(snapshot.search_results.is_empty());
    }
}
