//! Nearby fleet generation.
//!
//! Every attempt samples a point in the spawn ring and snaps it onto a road.
//! Attempts run concurrently on the blocking pool; a single consumer drains
//! the completions in arrival order and applies the spacing rule, so dedup
//! never races.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::config::FleetConfig;
use crate::geo::{distance_meters, sample_annulus_point, Coordinate};
use crate::snapping::RoadSnapper;

static NEXT_VEHICLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

impl VehicleId {
    /// Process-wide, monotonically increasing.
    pub fn next() -> Self {
        Self(NEXT_VEHICLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VehicleKind {
    #[default]
    Taxi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub coordinate: Coordinate,
    /// Heading in degrees, `[0, 360)`.
    pub bearing: f64,
    pub kind: VehicleKind,
    pub available: bool,
}

impl Vehicle {
    /// A fresh, available taxi facing north.
    pub fn taxi(coordinate: Coordinate) -> Self {
        Self {
            id: VehicleId::next(),
            coordinate,
            bearing: 0.0,
            kind: VehicleKind::Taxi,
            available: true,
        }
    }
}

/// RNG for one snap attempt: `seed + attempt` when seeded, entropy otherwise.
fn attempt_rng(seed: Option<u64>, attempt: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(attempt as u64)),
        None => StdRng::from_entropy(),
    }
}

/// Accept `candidate` if it keeps at least `min_spacing_m` from every
/// accepted point.
pub fn accept_if_distinct(
    accepted: &mut Vec<Coordinate>,
    candidate: Coordinate,
    min_spacing_m: f64,
) -> bool {
    let clear = accepted
        .iter()
        .all(|existing| distance_meters(*existing, candidate) >= min_spacing_m);
    if clear {
        accepted.push(candidate);
    }
    clear
}

pub struct FleetGenerator {
    snapper: Arc<RoadSnapper>,
    config: FleetConfig,
}

impl FleetGenerator {
    pub fn new(snapper: Arc<RoadSnapper>, config: FleetConfig) -> Self {
        Self { snapper, config }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Up to `desired` road-snapped vehicles around `center`.
    ///
    /// Launches `desired × attempt_multiplier` snap attempts at once. Fewer
    /// vehicles than requested is a normal outcome, not an error.
    pub async fn generate(&self, center: Coordinate, desired: usize) -> Vec<Vehicle> {
        if desired == 0 {
            return Vec::new();
        }

        let attempts = desired.saturating_mul(self.config.attempt_multiplier.max(1));
        let mut tasks = JoinSet::new();
        for attempt in 0..attempts {
            let snapper = Arc::clone(&self.snapper);
            let seed = self.config.seed;
            let (min_m, max_m) = (self.config.min_radius_m, self.config.max_radius_m);
            tasks.spawn_blocking(move || {
                let mut rng = attempt_rng(seed, attempt);
                let target = sample_annulus_point(&mut rng, center, min_m, max_m);
                snapper.snap(target, center)
            });
        }

        let mut accepted = Vec::with_capacity(desired);
        let mut failed = 0usize;
        let mut rejected = 0usize;
        // Drain everything so no attempt outlives this call.
        while let Some(outcome) = tasks.join_next().await {
            let snapped = match outcome {
                Ok(Some(point)) => point,
                Ok(None) => {
                    failed += 1;
                    continue;
                }
                Err(err) => {
                    log::warn!("snap attempt did not complete: {err}");
                    failed += 1;
                    continue;
                }
            };
            if accepted.len() >= desired {
                continue;
            }
            if !accept_if_distinct(&mut accepted, snapped, self.config.dedup_distance_m) {
                rejected += 1;
            }
        }

        log::info!(
            "fleet loaded: {} of {desired} vehicles from {attempts} attempts \
             ({failed} failed, {rejected} too close)",
            accepted.len()
        );
        accepted.into_iter().map(Vehicle::taxi).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_center, FailingRouteProvider, SpreadRouteProvider};

    fn pairwise_min_distance(vehicles: &[Vehicle]) -> f64 {
        let mut min = f64::INFINITY;
        for (i, a) in vehicles.iter().enumerate() {
            for b in &vehicles[i + 1..] {
                min = min.min(distance_meters(a.coordinate, b.coordinate));
            }
        }
        min
    }

    #[test]
    fn vehicle_ids_increase() {
        let a = VehicleId::next();
        let b = VehicleId::next();
        assert!(b > a);
    }

    #[test]
    fn spacing_rule_rejects_close_points() {
        let center = test_center();
        let mut accepted = Vec::new();
        assert!(accept_if_distinct(&mut accepted, center, 50.0));
        assert!(!accept_if_distinct(
            &mut accepted,
            crate::geo::offset_by_meters(center, 10.0, 0.0),
            50.0
        ));
        assert!(accept_if_distinct(
            &mut accepted,
            crate::geo::offset_by_meters(center, 80.0, 0.0),
            50.0
        ));
        assert_eq!(accepted.len(), 2);
    }

    #[tokio::test]
    async fn generates_requested_count_with_spacing() {
        let snapper = Arc::new(RoadSnapper::new(Arc::new(SpreadRouteProvider::new(60.0))));
        let generator = FleetGenerator::new(snapper, FleetConfig::default());
        let fleet = generator.generate(test_center(), 9).await;

        assert_eq!(fleet.len(), 9);
        assert!(pairwise_min_distance(&fleet) >= 50.0);
        assert!(fleet
            .iter()
            .all(|v| v.available && v.kind == VehicleKind::Taxi && v.bearing == 0.0));
    }

    #[tokio::test]
    async fn zero_requested_skips_the_provider() {
        let provider = Arc::new(SpreadRouteProvider::new(60.0));
        let snapper = Arc::new(RoadSnapper::new(provider.clone()));
        let generator = FleetGenerator::new(snapper, FleetConfig::default());

        assert!(generator.generate(test_center(), 0).await.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn failing_provider_gives_empty_fleet() {
        let snapper = Arc::new(RoadSnapper::new(Arc::new(FailingRouteProvider::default())));
        let generator = FleetGenerator::new(snapper, FleetConfig::default());
        assert!(generator.generate(test_center(), 9).await.is_empty());
    }

    #[tokio::test]
    async fn all_attempts_are_launched() {
        let provider = Arc::new(SpreadRouteProvider::new(60.0));
        let snapper = Arc::new(RoadSnapper::new(provider.clone()));
        let generator = FleetGenerator::new(snapper, FleetConfig::default());
        generator.generate(test_center(), 4).await;
        assert_eq!(provider.calls(), 12);
    }
}
