//! Error types for configuration, call bookkeeping, and simulation runs.

use bevy_ecs::prelude::Resource;
use thiserror::Error;
use tracing::error;

use crate::ecs::Direction;

/// Rejected configuration. Raised by [crate::scenario::ScenarioParams::validate]
/// before any simulation time elapses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("building needs at least 2 floors, got {0}")]
    TooFewFloors(u32),
    #[error("floor height must be positive, got {0}")]
    NonPositiveFloorHeight(f64),
    #[error("at least one car is required")]
    NoCars,
    #[error("car {car}: {field} must be positive, got {value}")]
    NonPositiveLimit {
        car: usize,
        field: &'static str,
        value: f64,
    },
    #[error("car {car}: capacity must be at least 1")]
    ZeroCapacity { car: usize },
    #[error("car {car}: floor {floor} is outside 1..={num_floors}")]
    CarFloorOutOfRange {
        car: usize,
        floor: u32,
        num_floors: u32,
    },
    #[error("car {car}: service floors must include its home floor {home_floor}")]
    HomeFloorNotServed { car: usize, home_floor: u32 },
    #[error("car {car}: main direction must be UP or DOWN")]
    InvalidMainDirection { car: usize },
    #[error("door timing {field} must be non-negative and finite, got {value}")]
    InvalidDoorTiming { field: &'static str, value: f64 },
    #[error("traffic: {0}")]
    InvalidTraffic(String),
    #[error("scripted passenger {index}: {reason}")]
    InvalidScriptedPassenger { index: usize, reason: String },
    #[error("scripted hall call {index}: {reason}")]
    InvalidScriptedHallCall { index: usize, reason: String },
    #[error("dispatch: {0}")]
    InvalidDispatch(String),
}

/// Broken call-registry invariant. These indicate defects, not domain conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("floor {floor} is outside 1..={num_floors}")]
    FloorOutOfRange { floor: u32, num_floors: u32 },
    #[error("no {direction:?} hall call is possible at floor {floor}")]
    ImpossibleDirection { floor: u32, direction: Direction },
    #[error("destination {destination} equals the call floor")]
    DestinationIsOrigin { destination: u32 },
    #[error("hall call {0} is unknown")]
    UnknownHallCall(u64),
    #[error("hall call {0} was already serviced")]
    AlreadyServiced(u64),
    #[error("car {car} has no registered call for floor {floor}")]
    UnknownCarCall { car: u32, floor: u32 },
    #[error("car {0} is unknown")]
    UnknownCar(u32),
}

/// Failure that aborts a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("call registry invariant violated: {0}")]
    Invariant(#[from] CallError),
}

/// Invariant violations recorded by systems during a step. The runner turns the
/// first one into [SimError::Invariant] and stops.
#[derive(Debug, Default, Resource)]
pub struct SimFaults {
    faults: Vec<CallError>,
}

impl SimFaults {
    pub fn record(&mut self, fault: CallError) {
        error!(%fault, "call registry invariant violated");
        self.faults.push(fault);
    }

    /// Records the error of a failed registry operation and discards the result.
    pub fn check<T>(&mut self, result: Result<T, CallError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(fault) => {
                self.record(fault);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn take_first(&mut self) -> Option<CallError> {
        if self.faults.is_empty() {
            return None;
        }
        let first = self.faults.remove(0);
        self.faults.clear();
        Some(first)
    }
}
