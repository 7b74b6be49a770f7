//! Passenger spawner: generates passengers from a [TrafficConfig].
//!
//! The spawner reacts to `SimulationStarted` and schedules its own
//! `SpawnPassenger` events until the traffic duration runs out. Origins and
//! destinations use an RNG seeded from the scenario seed plus the spawn count, so
//! a run is reproducible and independent of how many other events fired.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::secs_to_ms;
use crate::distributions::{inter_arrival_for, InterArrivalDistribution};
use crate::patterns::sample_trip;
use crate::scenario::{PassengerTiming, TrafficConfig};

#[derive(Debug, Resource)]
pub struct PassengerSpawner {
    pub config: TrafficConfig,
    inter_arrival: Box<dyn InterArrivalDistribution>,
    num_floors: u32,
    seed: u64,
    end_time_ms: u64,
    next_spawn_time_ms: u64,
    spawned_count: u64,
    pub initialized: bool,
}

impl PassengerSpawner {
    pub fn new(config: TrafficConfig, num_floors: u32, seed: u64) -> Self {
        let inter_arrival = inter_arrival_for(config.inter_arrival, config.arrival_rate, seed);
        let first = inter_arrival.sample_ms(0);
        Self {
            end_time_ms: secs_to_ms(config.duration_secs),
            next_spawn_time_ms: ms_from_sample(first, 0),
            inter_arrival,
            config,
            num_floors,
            seed,
            spawned_count: 0,
            initialized: false,
        }
    }

    /// Whether a passenger is due at `current_time_ms`.
    pub fn should_spawn(&self, current_time_ms: u64) -> bool {
        current_time_ms < self.end_time_ms && current_time_ms >= self.next_spawn_time_ms
    }

    /// Whether spawning continues after the currently scheduled time.
    pub fn has_next(&self) -> bool {
        self.next_spawn_time_ms < self.end_time_ms
    }

    /// Origin and destination for the next passenger.
    pub fn sample_trip(&self) -> (u32, u32) {
        let mut rng = StdRng::seed_from_u64(
            self.seed
                .wrapping_mul(31)
                .wrapping_add(self.spawned_count),
        );
        sample_trip(&mut rng, &self.config, self.num_floors)
    }

    /// Advances to the next spawn time and returns the sampled gap (ms).
    pub fn advance(&mut self, current_time_ms: u64) -> f64 {
        self.spawned_count += 1;
        let gap = self.inter_arrival.sample_ms(self.spawned_count);
        self.next_spawn_time_ms = ms_from_sample(gap, current_time_ms);
        gap
    }

    pub fn next_spawn_time_ms(&self) -> u64 {
        self.next_spawn_time_ms
    }

    pub fn spawned_count(&self) -> u64 {
        self.spawned_count
    }

    pub fn timing(&self) -> PassengerTiming {
        PassengerTiming {
            boarding_secs: self.config.avg_boarding_secs,
            alighting_secs: self.config.avg_alighting_secs,
        }
    }
}

fn ms_from_sample(gap_ms: f64, from_ms: u64) -> u64 {
    if !gap_ms.is_finite() {
        return u64::MAX;
    }
    from_ms.saturating_add(gap_ms.max(0.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::InterArrivalKind;

    fn uniform_traffic() -> TrafficConfig {
        TrafficConfig {
            inter_arrival: InterArrivalKind::Uniform,
            arrival_rate: 0.5,
            duration_secs: 5.0,
            ..TrafficConfig::default()
        }
    }

    #[test]
    fn spawns_on_schedule_until_duration() {
        let mut spawner = PassengerSpawner::new(uniform_traffic(), 10, 1);
        assert_eq!(spawner.next_spawn_time_ms(), 2000);
        assert!(!spawner.should_spawn(1000));
        assert!(spawner.should_spawn(2000));
        spawner.advance(2000);
        assert_eq!(spawner.next_spawn_time_ms(), 4000);
        assert!(spawner.has_next());
        spawner.advance(4000);
        assert!(!spawner.has_next());
        assert!(!spawner.should_spawn(6000));
        assert_eq!(spawner.spawned_count(), 2);
    }

    #[test]
    fn same_seed_same_trips() {
        let a = PassengerSpawner::new(uniform_traffic(), 10, 9);
        let b = PassengerSpawner::new(uniform_traffic(), 10, 9);
        assert_eq!(a.sample_trip(), b.sample_trip());
    }
}
