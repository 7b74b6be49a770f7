//! Shared fixtures for unit and integration tests.

use bevy_ecs::prelude::World;
use serde_json::Value;

use crate::bus::{BusEventType, BusMessage, EventLog};
use crate::runner::initialize_simulation;
use crate::scenario::{build_scenario, CarConfig, ScenarioParams};
use crate::simulation::ElevatorSimulation;

/// Step budget large enough for any hand-written scenario.
pub const TEST_MAX_STEPS: usize = 100_000;

/// Building with `floors` floors and `cars` default cars, all starting at floor 1.
pub fn test_params(floors: u32, cars: usize) -> ScenarioParams {
    ScenarioParams::default().with_floors(floors).with_cars(cars)
}

/// A default car parked at `floor`.
pub fn car_at(floor: u32) -> CarConfig {
    CarConfig::default().with_start_floor(floor)
}

/// Builds the scenario into a fresh world and queues the start event.
///
/// # Panics
///
/// Panics if `params` fail validation.
pub fn create_test_world(params: ScenarioParams) -> World {
    let mut world = World::new();
    build_scenario(&mut world, params).expect("test scenario should be valid");
    initialize_simulation(&mut world);
    world
}

/// Runs `params` to completion and returns the simulation with its bus log.
///
/// # Panics
///
/// Panics on invalid params or if the run records an invariant violation.
pub fn run_logged(params: ScenarioParams) -> (ElevatorSimulation, EventLog) {
    let mut sim = ElevatorSimulation::new(params).expect("test scenario should be valid");
    let log = sim.event_log();
    sim.run_to_completion(TEST_MAX_STEPS)
        .expect("run should not violate call invariants");
    (sim, log)
}

/// Messages of one type, in publication order.
pub fn messages_of(messages: &[BusMessage], kind: BusEventType) -> Vec<&BusMessage> {
    messages.iter().filter(|m| m.kind == kind).collect()
}

/// Door events of `car` as `(time, floor, event_type)`.
pub fn door_events(messages: &[BusMessage], car: u32) -> Vec<(f64, u64, String)> {
    messages_of(messages, BusEventType::DoorEvent)
        .into_iter()
        .filter(|m| m.data["car"] == Value::from(car))
        .map(|m| {
            (
                m.time,
                m.data["floor"].as_u64().unwrap_or_default(),
                m.data["event_type"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Whether two floating-point times agree to the millisecond.
pub fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3 + f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::BuildingConfig;

    #[test]
    fn create_test_world_applies_params() {
        let world = create_test_world(test_params(7, 2));
        assert_eq!(world.resource::<BuildingConfig>().num_floors, 7);
    }

    #[test]
    fn door_events_filter_by_car() {
        let (_, log) = run_logged(test_params(5, 1).with_passenger(0.0, 1, 3));
        let messages = log.messages();
        let events = door_events(&messages, 0);
        assert_eq!(events.first().map(|e| e.2.as_str()), Some("OPENING_START"));
        assert!(door_events(&messages, 1).is_empty());
    }
}
