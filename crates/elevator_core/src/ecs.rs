//! Components and shared resources for cars, doors, and passengers.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bevy_ecs::prelude::{Component, Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::clock::{ms_to_secs, EventId};
use crate::kinematics::{braking_distance, MotionLimits, SCurveProfile};

pub type CarId = u32;
pub type PassengerId = u64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    #[default]
    None,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::None => Direction::None,
        }
    }

    /// Direction of travel from `from` to `to`.
    pub fn between(from: f64, to: f64) -> Self {
        if to > from {
            Direction::Up
        } else if to < from {
            Direction::Down
        } else {
            Direction::None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotionPhase {
    #[default]
    Idle,
    Moving,
    Decelerating,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoorState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// One leg of travel between stops.
#[derive(Debug, Clone)]
pub struct CarTrip {
    pub origin: u32,
    pub target: u32,
    pub departed_at: u64,
    pub profile: SCurveProfile,
    /// Repositioning move: arrive without opening the door.
    pub move_only: bool,
    pub decelerate_event: Option<EventId>,
    pub arrive_event: Option<EventId>,
    pub floor_events: Vec<EventId>,
}

impl CarTrip {
    pub fn elapsed_secs(&self, now: u64) -> f64 {
        ms_to_secs(now.saturating_sub(self.departed_at))
    }

    pub fn direction(&self) -> Direction {
        Direction::between(self.origin as f64, self.target as f64)
    }

    pub fn scheduled_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.decelerate_event
            .iter()
            .chain(self.arrive_event.iter())
            .chain(self.floor_events.iter())
            .copied()
    }
}

#[derive(Debug, Clone, Component)]
pub struct Car {
    pub id: CarId,
    /// Floor the car is at, or the floor it last left while a trip is active.
    pub floor: u32,
    pub direction: Direction,
    pub phase: MotionPhase,
    /// Direction being served at the current stop.
    pub serving: Direction,
    pub capacity: u32,
    pub onboard: Vec<Entity>,
    pub limits: MotionLimits,
    pub full_load_bypass: bool,
    pub home_floor: u32,
    pub main_direction: Direction,
    pub service_floors: BTreeSet<u32>,
    pub trip: Option<CarTrip>,
    pub idle_since: Option<u64>,
}

impl Car {
    pub fn load(&self) -> u32 {
        self.onboard.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.load() >= self.capacity
    }

    pub fn free_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.load())
    }

    pub fn serves(&self, floor: u32) -> bool {
        self.service_floors.contains(&floor)
    }

    /// Continuous floor position at `now`.
    pub fn position_at(&self, now: u64, floor_height: f64) -> f64 {
        match &self.trip {
            Some(trip) => {
                let metres = trip.profile.position_at(trip.elapsed_secs(now));
                trip.origin as f64 + metres / floor_height
            }
            None => self.floor as f64,
        }
    }

    /// Nearest floor the car could still stop at, given its current velocity.
    pub fn advanced_floor(&self, now: u64, floor_height: f64) -> u32 {
        let Some(trip) = &self.trip else {
            return self.floor;
        };
        if self.phase != MotionPhase::Moving {
            return trip.target;
        }
        let t = trip.elapsed_secs(now);
        let speed = trip.profile.velocity_at(t).abs();
        let reach = (trip.profile.position_at(t).abs() + braking_distance(speed, &self.limits))
            / floor_height;
        let floors = (reach - 1e-6).ceil().max(0.0) as u32;
        match trip.direction() {
            Direction::Up => (trip.origin + floors).min(trip.target),
            Direction::Down => trip.origin.saturating_sub(floors).max(trip.target),
            Direction::None => trip.target,
        }
    }
}

#[derive(Debug, Clone, Default, Component)]
pub struct Door {
    pub state: DoorState,
    pub reopen_count: u32,
    /// Pending `DoorClosed` event while the door is closing.
    pub close_event: Option<EventId>,
    /// The transfer loop already waited one dwell period with nothing to do.
    pub dwell_waited: bool,
    /// Whether anyone boarded during the current stop.
    pub boarded_this_stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerState {
    #[default]
    Pending,
    Waiting,
    Riding,
    Arrived,
}

#[derive(Debug, Clone, Component)]
pub struct Passenger {
    pub id: PassengerId,
    pub origin: u32,
    pub destination: u32,
    pub state: PassengerState,
    pub call_time: Option<u64>,
    pub boarding_time: Option<u64>,
    pub alighting_time: Option<u64>,
    pub car: Option<Entity>,
    /// Hall call this passenger is waiting on.
    pub hall_call: Option<u64>,
    pub boarding_secs: f64,
    pub alighting_secs: f64,
}

impl Passenger {
    pub fn new(id: PassengerId, origin: u32, destination: u32) -> Self {
        Self {
            id,
            origin,
            destination,
            state: PassengerState::Pending,
            call_time: None,
            boarding_time: None,
            alighting_time: None,
            car: None,
            hall_call: None,
            boarding_secs: 1.0,
            alighting_secs: 0.8,
        }
    }

    pub fn with_transfer_times(mut self, boarding_secs: f64, alighting_secs: f64) -> Self {
        self.boarding_secs = boarding_secs;
        self.alighting_secs = alighting_secs;
        self
    }

    pub fn direction(&self) -> Direction {
        Direction::between(self.origin as f64, self.destination as f64)
    }
}

/// Waiting passengers by (floor, direction), in arrival order.
#[derive(Debug, Default, Resource)]
pub struct FloorQueues {
    queues: BTreeMap<(u32, Direction), VecDeque<Entity>>,
}

impl FloorQueues {
    pub fn push(&mut self, floor: u32, direction: Direction, passenger: Entity) {
        self.queues
            .entry((floor, direction))
            .or_default()
            .push_back(passenger);
    }

    pub fn remove(&mut self, floor: u32, direction: Direction, passenger: Entity) -> bool {
        let Some(queue) = self.queues.get_mut(&(floor, direction)) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|p| *p != passenger);
        before != queue.len()
    }

    pub fn waiting(&self, floor: u32, direction: Direction) -> impl Iterator<Item = Entity> + '_ {
        self.queues
            .get(&(floor, direction))
            .into_iter()
            .flat_map(|q| q.iter().copied())
    }

    pub fn len(&self, floor: u32, direction: Direction) -> usize {
        self.queues.get(&(floor, direction)).map_or(0, VecDeque::len)
    }

    pub fn total_waiting(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

/// Car entities by car id.
#[derive(Debug, Default, Resource)]
pub struct CarRoster {
    entities: BTreeMap<CarId, Entity>,
}

impl CarRoster {
    pub fn insert(&mut self, id: CarId, entity: Entity) {
        self.entities.insert(id, entity);
    }

    pub fn entity(&self, id: CarId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = CarId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Source of passenger ids shared by scripted and generated passengers.
#[derive(Debug, Default, Resource)]
pub struct NextPassengerId(pub PassengerId);

impl NextPassengerId {
    pub fn allocate(&mut self) -> PassengerId {
        let id = self.0;
        self.0 += 1;
        id
    }
}
