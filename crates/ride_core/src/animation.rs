//! Idle drift of the nearby fleet.
//!
//! On every tick a few vehicles are moved to a random nearby point. The
//! stored coordinate jumps to the target at once; the returned
//! [`VehicleTransition`] tells the presentation layer how long to take
//! getting there on screen.

use std::future::pending;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::AnimatorConfig;
use crate::fleet::{Vehicle, VehicleId};
use crate::geo::{bearing_between, sample_annulus_point, Coordinate};

/// Draw budget per requested index when resampling on collision.
const DRAWS_PER_INDEX: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleTransition {
    pub vehicle_id: VehicleId,
    pub from: Coordinate,
    pub to: Coordinate,
    pub bearing: f64,
    pub duration: Duration,
}

/// Up to `count` distinct indices below `len`, drawn uniformly with
/// resampling on collision. The number of draws is bounded, so the result may
/// be short when the budget runs out.
pub fn select_unique_indices<R: Rng + ?Sized>(rng: &mut R, len: usize, count: usize) -> Vec<usize> {
    let count = count.min(len);
    let mut selected = Vec::with_capacity(count);
    let mut draws = 0;
    while selected.len() < count && draws < count * DRAWS_PER_INDEX {
        draws += 1;
        let index = rng.gen_range(0..len);
        if !selected.contains(&index) {
            selected.push(index);
        }
    }
    selected
}

pub struct VehicleAnimator {
    config: AnimatorConfig,
    rng: StdRng,
    timer: Option<Interval>,
}

impl VehicleAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            timer: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Start ticking one interval from now. No-op when already running.
    pub fn start(&mut self) -> bool {
        self.start_after(self.config.tick_interval)
    }

    /// Start with the first tick after `delay`. No-op when already running.
    pub fn start_after(&mut self, delay: Duration) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut timer = interval_at(Instant::now() + delay, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        log::info!("vehicle animations started");
        true
    }

    pub fn stop(&mut self) -> bool {
        let was_running = self.timer.take().is_some();
        if was_running {
            log::info!("vehicle animations stopped");
        }
        was_running
    }

    /// Wait for the next tick. Never resolves while stopped, so it can sit in
    /// a `select!` unconditionally.
    pub async fn next_tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => pending::<()>().await,
        }
    }

    /// Move a few vehicles and describe the moves.
    pub fn tick(&mut self, fleet: &mut [Vehicle]) -> Vec<VehicleTransition> {
        if fleet.is_empty() {
            return Vec::new();
        }
        let indices =
            select_unique_indices(&mut self.rng, fleet.len(), self.config.vehicles_per_tick);
        indices
            .into_iter()
            .map(|index| self.drift(&mut fleet[index]))
            .collect()
    }

    fn drift(&mut self, vehicle: &mut Vehicle) -> VehicleTransition {
        let from = vehicle.coordinate;
        let to = sample_annulus_point(
            &mut self.rng,
            from,
            self.config.min_drift_m,
            self.config.max_drift_m,
        );
        let bearing = bearing_between(from, to);
        let duration = self.transition_duration();

        vehicle.coordinate = to;
        vehicle.bearing = bearing;

        VehicleTransition {
            vehicle_id: vehicle.id,
            from,
            to,
            bearing,
            duration,
        }
    }

    fn transition_duration(&mut self) -> Duration {
        let low = self.config.min_transition.min(self.config.max_transition);
        let high = self.config.min_transition.max(self.config.max_transition);
        if low == high {
            return low;
        }
        Duration::from_secs_f64(self.rng.gen_range(low.as_secs_f64()..=high.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{distance_meters, offset_by_meters};
    use crate::test_helpers::test_center;

    fn fleet(size: usize) -> Vec<Vehicle> {
        (0..size)
            .map(|i| Vehicle::taxi(offset_by_meters(test_center(), 100.0 * i as f64, 0.0)))
            .collect()
    }

    fn seeded() -> VehicleAnimator {
        VehicleAnimator::new(AnimatorConfig {
            seed: Some(42),
            ..AnimatorConfig::default()
        })
    }

    #[test]
    fn one_tick_moves_exactly_one_vehicle() {
        let mut animator = seeded();
        let mut vehicles = fleet(5);
        let before = vehicles.clone();

        let transitions = animator.tick(&mut vehicles);
        assert_eq!(transitions.len(), 1);

        let moved: Vec<_> = before
            .iter()
            .zip(&vehicles)
            .filter(|(old, new)| old.coordinate != new.coordinate)
            .collect();
        assert_eq!(moved.len(), 1);

        let (old, new) = moved[0];
        let distance = distance_meters(old.coordinate, new.coordinate);
        assert!(
            (30.0 * 0.99..=80.0 * 1.01).contains(&distance),
            "drift {distance}"
        );
        assert_eq!(new.bearing, bearing_between(old.coordinate, new.coordinate));

        let transition = &transitions[0];
        assert_eq!(transition.vehicle_id, new.id);
        assert_eq!(transition.from, old.coordinate);
        assert_eq!(transition.to, new.coordinate);
        assert!((Duration::from_secs(40)..=Duration::from_secs(60)).contains(&transition.duration));
    }

    #[test]
    fn empty_fleet_is_a_no_op() {
        let mut animator = seeded();
        assert!(animator.tick(&mut []).is_empty());
    }

    #[test]
    fn selection_is_capped_at_fleet_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut indices = select_unique_indices(&mut rng, 3, 10);
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(select_unique_indices(&mut rng, 0, 1).is_empty());
    }

    #[test]
    fn selected_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let mut indices = select_unique_indices(&mut rng, 9, 4);
            let len = indices.len();
            indices.sort_unstable();
            indices.dedup();
            assert_eq!(indices.len(), len);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_is_safe() {
        let mut animator = seeded();
        assert!(!animator.stop());
        assert!(animator.start_after(Duration::from_secs(2)));
        assert!(!animator.start());
        assert!(animator.is_running());

        let started = Instant::now();
        animator.next_tick().await;
        assert!(started.elapsed() >= Duration::from_secs(2));

        assert!(animator.stop());
        assert!(!animator.is_running());
    }
}
