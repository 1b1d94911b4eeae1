//! Debounced, cancellable place search.
//!
//! [`PlaceSearchCoordinator`] is a plain state machine driven by the session
//! actor: it is told when text changes and when the clock passes its
//! deadline, and answers with the [`SearchAction`] to perform. Every launched
//! search carries a ticket; a completion whose ticket is no longer current
//! belongs to a cancelled search and is dropped.

use std::collections::HashMap;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::draft::SearchField;
use crate::error::SearchError;
use crate::places::{Place, PlaceCandidate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    None,
    /// Query too short: results were cleared without searching.
    Clear,
    Search { ticket: u64, query: String },
}

#[derive(Debug, Clone)]
struct PendingQuery {
    field: SearchField,
    text: String,
    deadline: Instant,
}

pub struct PlaceSearchCoordinator {
    config: SearchConfig,
    active_field: SearchField,
    pending: Option<PendingQuery>,
    last_debounced: HashMap<SearchField, String>,
    ticket: u64,
    in_flight: Option<AbortHandle>,
    results: Vec<Place>,
    loading: bool,
}

impl PlaceSearchCoordinator {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            active_field: SearchField::default(),
            pending: None,
            last_debounced: HashMap::new(),
            ticket: 0,
            in_flight: None,
            results: Vec::new(),
            loading: false,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn results(&self) -> &[Place] {
        &self.results
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn active_field(&self) -> SearchField {
        self.active_field
    }

    pub fn set_active_field(&mut self, field: SearchField) {
        self.active_field = field;
    }

    /// Record new text for `field`; restarts the debounce window.
    pub fn query_changed(&mut self, field: SearchField, text: String, now: Instant) {
        self.pending = Some(PendingQuery {
            field,
            text,
            deadline: now + self.config.debounce,
        });
    }

    /// When the pending query becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Fire the pending query if its debounce window has elapsed.
    pub fn fire_due(&mut self, now: Instant) -> SearchAction {
        let due = matches!(&self.pending, Some(pending) if pending.deadline <= now);
        if !due {
            return SearchAction::None;
        }
        let Some(PendingQuery { field, text, .. }) = self.pending.take() else {
            return SearchAction::None;
        };

        if self.last_debounced.get(&field) == Some(&text) {
            log::debug!("query for {field:?} unchanged, not searching again");
            return SearchAction::None;
        }
        self.last_debounced.insert(field, text.clone());

        if field != self.active_field {
            log::debug!("ignoring query for inactive field {field:?}");
            return SearchAction::None;
        }

        self.cancel_in_flight();

        let query = text.trim();
        if query.chars().count() < self.config.min_query_chars {
            self.results.clear();
            return SearchAction::Clear;
        }

        self.loading = true;
        SearchAction::Search {
            ticket: self.ticket,
            query: query.to_string(),
        }
    }

    /// Remember the task running `ticket` so a later search can abort it.
    pub fn attach(&mut self, ticket: u64, handle: AbortHandle) {
        if ticket == self.ticket {
            self.in_flight = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Apply the outcome of search `ticket`. Returns false for stale tickets.
    pub fn complete(
        &mut self,
        ticket: u64,
        outcome: Result<Vec<PlaceCandidate>, SearchError>,
    ) -> bool {
        if ticket != self.ticket {
            log::debug!("discarding results of superseded search {ticket}");
            return false;
        }
        self.in_flight = None;
        self.loading = false;
        match outcome {
            Ok(candidates) => {
                self.results = candidates
                    .into_iter()
                    .take(self.config.max_results)
                    .map(Place::from_candidate)
                    .collect();
            }
            Err(error) => {
                log::warn!("place search failed: {error}");
                self.results.clear();
            }
        }
        true
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    /// Abort the running search, if any; its result will be ignored.
    pub fn cancel_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.ticket += 1;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::places::AddressComponents;
    use std::time::Duration;

    const SETTLED: Duration = Duration::from_secs(1);

    fn candidate(name: &str) -> PlaceCandidate {
        PlaceCandidate {
            name: Some(name.to_string()),
            address: AddressComponents::default(),
            coordinate: Coordinate::new(41.0, 29.0),
        }
    }

    fn coordinator() -> PlaceSearchCoordinator {
        PlaceSearchCoordinator::new(SearchConfig::default())
    }

    #[test]
    fn rapid_typing_fires_once_with_last_text() {
        let mut search = coordinator();
        let t0 = Instant::now();
        for (offset_ms, text) in [(0, "Is"), (30, "Ist"), (60, "Ista"), (90, "Istanbul")] {
            let now = t0 + Duration::from_millis(offset_ms);
            search.query_changed(SearchField::Destination, text.to_string(), now);
            assert_eq!(search.fire_due(now), SearchAction::None);
        }

        assert_eq!(
            search.fire_due(t0 + Duration::from_millis(589)),
            SearchAction::None
        );
        let action = search.fire_due(t0 + Duration::from_millis(590));
        assert!(matches!(action, SearchAction::Search { ref query, .. } if query == "Istanbul"));
        assert_eq!(search.fire_due(t0 + Duration::from_secs(5)), SearchAction::None);
        assert!(search.is_loading());
    }

    #[test]
    fn short_queries_clear_results() {
        let mut search = coordinator();
        let t0 = Instant::now();
        search.query_changed(SearchField::Destination, "Taksim".to_string(), t0);
        let SearchAction::Search { ticket, .. } = search.fire_due(t0 + SETTLED) else {
            panic!("expected a search");
        };
        assert!(search.complete(ticket, Ok(vec![candidate("Taksim Square")])));
        assert_eq!(search.results().len(), 1);

        search.query_changed(SearchField::Destination, " Ta ".to_string(), t0);
        assert_eq!(search.fire_due(t0 + Duration::from_secs(1)), SearchAction::Clear);
        assert!(search.results().is_empty());
    }

    #[test]
    fn unicode_length_counts_characters() {
        let mut search = coordinator();
        let t0 = Instant::now();
        // Four characters, eight bytes.
        search.query_changed(SearchField::Destination, "Şişl".to_string(), t0);
        assert!(matches!(
            search.fire_due(t0 + Duration::from_secs(1)),
            SearchAction::Search { .. }
        ));
    }

    #[test]
    fn identical_debounced_query_does_not_repeat() {
        let mut search = coordinator();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(1);
        search.query_changed(SearchField::Destination, "Kadikoy".to_string(), t0);
        assert!(matches!(search.fire_due(later), SearchAction::Search { .. }));

        search.query_changed(SearchField::Destination, "Kadikoy".to_string(), later);
        assert_eq!(search.fire_due(later + Duration::from_secs(1)), SearchAction::None);
    }

    #[test]
    fn inactive_field_queries_are_ignored() {
        let mut search = coordinator();
        let t0 = Instant::now();
        search.set_active_field(SearchField::Pickup);
        search.query_changed(SearchField::Stop(0), "Besiktas".to_string(), t0);
        assert_eq!(search.fire_due(t0 + Duration::from_secs(1)), SearchAction::None);
    }

    #[test]
    fn superseded_results_never_overwrite() {
        let mut search = coordinator();
        let t0 = Instant::now();
        search.query_changed(SearchField::Destination, "Uskudar".to_string(), t0);
        let SearchAction::Search { ticket: first, .. } = search.fire_due(t0 + SETTLED) else {
            panic!("expected first search");
        };
        search.query_changed(SearchField::Destination, "Uskudar Sahil".to_string(), t0);
        let SearchAction::Search { ticket: second, .. } = search.fire_due(t0 + SETTLED) else {
            panic!("expected second search");
        };
        assert_ne!(first, second);

        assert!(search.complete(second, Ok(vec![candidate("Uskudar Sahil")])));
        assert!(!search.complete(first, Ok(vec![candidate("Stale")])));
        assert_eq!(search.results()[0].title, "Uskudar Sahil");
    }

    #[test]
    fn results_are_capped_in_provider_order() {
        let mut search = coordinator();
        let t0 = Instant::now();
        search.query_changed(SearchField::Destination, "Cafe".to_string(), t0);
        let SearchAction::Search { ticket, .. } = search.fire_due(t0 + SETTLED) else {
            panic!("expected a search");
        };
        let candidates: Vec<_> = (0..20).map(|i| candidate(&format!("Cafe {i}"))).collect();
        search.complete(ticket, Ok(candidates));

        let titles: Vec<_> = search.results().iter().map(|p| p.title.clone()).collect();
        assert_eq!(titles.len(), 15);
        assert_eq!(titles[0], "Cafe 0");
        assert_eq!(titles[14], "Cafe 14");
    }

    #[test]
    fn provider_failure_clears_results() {
        let mut search = coordinator();
        let t0 = Instant::now();
        search.query_changed(SearchField::Destination, "Fatih".to_string(), t0);
        let SearchAction::Search { ticket, .. } = search.fire_due(t0 + SETTLED) else {
            panic!("expected a search");
        };
        assert!(search.complete(ticket, Err(SearchError::Http("timeout".to_string()))));
        assert!(search.results().is_empty());
        assert!(!search.is_loading());
    }
}
