#![allow(dead_code)]

use elevator_core::scenario::{
    CarConfig, ReassignmentPolicy, ScenarioParams, TrafficConfig, TrafficPatternKind,
};

/// Ten floors, one default car at the lobby.
pub fn one_car_building() -> ScenarioParams {
    ScenarioParams::default().with_floors(10).with_cars(1)
}

pub fn reassignment_enabled() -> ReassignmentPolicy {
    ReassignmentPolicy {
        enabled: true,
        min_improvement: 1.0,
    }
}

/// A short seeded traffic run on a small bank of cars.
pub fn traffic_building(seed: u64, pattern: TrafficPatternKind) -> ScenarioParams {
    ScenarioParams::default()
        .with_seed(seed)
        .with_floors(12)
        .with_car_configs(vec![CarConfig::default().with_capacity(4); 3])
        .with_traffic(TrafficConfig {
            pattern,
            duration_secs: 240.0,
            arrival_rate: 0.15,
            ..TrafficConfig::default()
        })
}
