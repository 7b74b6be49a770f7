use std::collections::BTreeSet;

use bevy_ecs::prelude::Entity;

use crate::calls::{CallRegistry, CallSnapshot, CarCallView, HallCall};
use crate::ecs::{Car, CarId, Direction, Door, DoorState, MotionPhase};
use crate::kinematics::MotionLimits;
use crate::scenario::BuildingConfig;

/// Read-only view of one car at dispatch time.
#[derive(Debug, Clone)]
pub struct CarSnapshot {
    pub id: CarId,
    pub entity: Entity,
    /// Continuous floor position.
    pub position: f64,
    /// Nearest floor the car can still stop at; its current floor when not moving.
    pub advanced_floor: u32,
    pub direction: Direction,
    pub phase: MotionPhase,
    pub door: DoorState,
    pub load: u32,
    pub capacity: u32,
    pub limits: MotionLimits,
    pub full_load_bypass: bool,
    pub home_floor: u32,
    pub main_direction: Direction,
    pub service_floors: BTreeSet<u32>,
    pub trip_target: Option<u32>,
    pub idle_since: Option<u64>,
    pub calls: CarCallView,
}

impl CarSnapshot {
    pub fn from_car(
        entity: Entity,
        car: &Car,
        door: &Door,
        registry: &CallRegistry,
        now: u64,
        floor_height: f64,
    ) -> Self {
        Self {
            id: car.id,
            entity,
            position: car.position_at(now, floor_height),
            advanced_floor: car.advanced_floor(now, floor_height),
            direction: car.direction,
            phase: car.phase,
            door: door.state,
            load: car.load(),
            capacity: car.capacity,
            limits: car.limits,
            full_load_bypass: car.full_load_bypass,
            home_floor: car.home_floor,
            main_direction: car.main_direction,
            service_floors: car.service_floors.clone(),
            trip_target: car.trip.as_ref().map(|t| t.target),
            idle_since: car.idle_since,
            calls: registry.view_for(car.id),
        }
    }

    pub fn is_full(&self) -> bool {
        self.load >= self.capacity
    }

    /// Parked with the door shut and nothing to do.
    pub fn is_idle(&self) -> bool {
        self.phase == MotionPhase::Idle
            && self.door == DoorState::Closed
            && self.calls.car_calls.is_empty()
            && self.calls.hall_calls.is_empty()
            && self.calls.forced.is_none()
            && self.calls.move_target.is_none()
    }

    pub fn serves(&self, floor: u32) -> bool {
        self.service_floors.contains(&floor)
    }

    pub fn assignment_count(&self) -> usize {
        self.calls.hall_calls.len()
    }

    /// Whether the car may take `call` at all.
    pub fn can_accept(&self, call: &HallCall) -> bool {
        !self.is_full()
            && self.serves(call.floor)
            && call.destination.map_or(true, |d| self.serves(d))
    }
}

/// Everything a strategy may look at. Built from registered state only.
#[derive(Debug, Clone)]
pub struct DispatchSnapshot {
    pub now: u64,
    pub num_floors: u32,
    pub floor_height: f64,
    pub stop_time_secs: f64,
    /// Ordered by car id.
    pub cars: Vec<CarSnapshot>,
    pub calls: CallSnapshot,
}

impl DispatchSnapshot {
    pub fn new(
        now: u64,
        building: &BuildingConfig,
        stop_time_secs: f64,
        mut cars: Vec<CarSnapshot>,
        registry: &CallRegistry,
    ) -> Self {
        cars.sort_by_key(|c| c.id);
        Self {
            now,
            num_floors: building.num_floors,
            floor_height: building.floor_height,
            stop_time_secs,
            cars,
            calls: registry.snapshot(now),
        }
    }

    pub fn car(&self, id: CarId) -> Option<&CarSnapshot> {
        self.cars.iter().find(|c| c.id == id)
    }

    /// Reflects an assignment made earlier in the same pass. `call` is the
    /// record as it was before the assignment.
    pub fn note_assignment(&mut self, call: &HallCall, car: CarId) {
        let key = (call.floor, call.direction);
        if let Some(previous) = call.assigned_car.filter(|p| *p != car) {
            if let Some(prev) = self.cars.iter_mut().find(|c| c.id == previous) {
                if let Some(pos) = prev.calls.hall_calls.iter().position(|hc| *hc == key) {
                    prev.calls.hall_calls.remove(pos);
                }
            }
        }
        if let Some(target) = self.cars.iter_mut().find(|c| c.id == car) {
            target.calls.hall_calls.push(key);
            target.calls.forced = None;
            target.calls.move_target = None;
        }
        if let Some(entry) = self.calls.hall_calls.iter_mut().find(|c| c.id == call.id) {
            entry.assigned_car = Some(car);
            entry.assigned_at = Some(self.now);
        }
    }
}
