use serde::Serialize;

use crate::ecs::{CarId, Direction};

pub type CallId = u64;

/// Floor-side request for a car. `destination` is set under destination control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HallCall {
    pub id: CallId,
    pub floor: u32,
    pub direction: Direction,
    pub destination: Option<u32>,
    pub registered_at: u64,
    pub assigned_car: Option<CarId>,
    pub assigned_at: Option<u64>,
    /// Set once the assigned car begins decelerating for this floor; no reassignment after that.
    pub committed: bool,
    pub serviced_at: Option<u64>,
    pub serviced_by: Option<CarId>,
}

impl HallCall {
    pub fn is_pending(&self) -> bool {
        self.serviced_at.is_none()
    }

    pub fn is_unassigned(&self) -> bool {
        self.is_pending() && self.assigned_car.is_none()
    }
}

/// Destination request registered from inside a car.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarCall {
    pub car: CarId,
    pub floor: u32,
    pub registered_at: u64,
    pub serviced_at: Option<u64>,
}

/// Dispatcher-issued move that the car treats like a hall call in `direction`:
/// it stops and opens the door at `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForcedMove {
    pub car: CarId,
    pub floor: u32,
    pub direction: Direction,
    pub issued_at: u64,
}

/// Dispatcher-issued move that only repositions an idle car; the door stays shut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveCommand {
    pub car: CarId,
    pub floor: u32,
    pub issued_at: u64,
}

/// Whether hall calls carry destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    #[default]
    Traditional,
    DestinationControl,
}

/// Calls one car must honor, as seen by its stop planner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarCallView {
    pub car_calls: Vec<u32>,
    pub hall_calls: Vec<(u32, Direction)>,
    pub forced: Option<(u32, Direction)>,
    pub move_target: Option<u32>,
}

/// Immutable copy of the registry handed to strategies.
#[derive(Debug, Clone, Default)]
pub struct CallSnapshot {
    pub taken_at: u64,
    pub hall_calls: Vec<HallCall>,
    pub car_calls: Vec<CarCall>,
    pub forced_moves: Vec<ForcedMove>,
    pub move_commands: Vec<MoveCommand>,
}

impl CallSnapshot {
    pub fn unassigned(&self) -> impl Iterator<Item = &HallCall> {
        self.hall_calls.iter().filter(|c| c.is_unassigned())
    }

    pub fn assigned_to(&self, car: CarId) -> impl Iterator<Item = &HallCall> {
        self.hall_calls
            .iter()
            .filter(move |c| c.is_pending() && c.assigned_car == Some(car))
    }

    pub fn car_calls_of(&self, car: CarId) -> impl Iterator<Item = &CarCall> {
        self.car_calls.iter().filter(move |c| c.car == car)
    }
}
