//! Scenario setup: building, cars, doors, dispatch policy, and passenger traffic.
//!
//! Configuration is consumed once by [build_scenario] and is immutable for the
//! rest of the run.

mod build;
mod params;

pub use build::{build_scenario, PendingHallCalls, PendingPassengers};
pub use params::{
    AllocationKind, BuildingConfig, CarConfig, DispatchConfig, DoorConfig, InterArrivalKind,
    PassengerTiming, ReassignmentPolicy, RepositioningKind, ScenarioParams, ScriptedHallCall,
    ScriptedPassenger, SimulationEndTimeMs, TrafficConfig, TrafficPatternKind,
};
