//! Single source of truth for hall calls, car calls, and dispatcher commands.
//!
//! Every mutation happens inside a kernel-ordered system, so the registry needs
//! no locking. Serviced hall calls stay visible until [CallRegistry::purge_cleared]
//! moves them to history.

use std::collections::{BTreeMap, BTreeSet};

use bevy_ecs::prelude::Resource;
use tracing::debug;

use super::types::{
    CallId, CallMode, CallSnapshot, CarCall, CarCallView, ForcedMove, HallCall, MoveCommand,
};
use crate::ecs::{CarId, Direction};
use crate::error::CallError;

/// Side effects of assigning a hall call, for the caller to publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignOutcome {
    pub previous_car: Option<CarId>,
    pub cleared_forced: Option<ForcedMove>,
    pub cancelled_move: Option<MoveCommand>,
}

#[derive(Debug, Resource)]
pub struct CallRegistry {
    num_floors: u32,
    mode: CallMode,
    cars: BTreeSet<CarId>,
    next_id: CallId,
    hall_calls: BTreeMap<CallId, HallCall>,
    history: BTreeMap<CallId, HallCall>,
    car_calls: BTreeMap<(CarId, u32), CarCall>,
    car_call_history: Vec<CarCall>,
    forced: BTreeMap<CarId, ForcedMove>,
    moves: BTreeMap<CarId, MoveCommand>,
}

impl CallRegistry {
    pub fn new(num_floors: u32, mode: CallMode, cars: impl IntoIterator<Item = CarId>) -> Self {
        Self {
            num_floors,
            mode,
            cars: cars.into_iter().collect(),
            next_id: 0,
            hall_calls: BTreeMap::new(),
            history: BTreeMap::new(),
            car_calls: BTreeMap::new(),
            car_call_history: Vec::new(),
            forced: BTreeMap::new(),
            moves: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> CallMode {
        self.mode
    }

    pub fn num_floors(&self) -> u32 {
        self.num_floors
    }

    fn check_floor(&self, floor: u32) -> Result<(), CallError> {
        if floor == 0 || floor > self.num_floors {
            return Err(CallError::FloorOutOfRange {
                floor,
                num_floors: self.num_floors,
            });
        }
        Ok(())
    }

    fn check_car(&self, car: CarId) -> Result<(), CallError> {
        if self.cars.contains(&car) {
            Ok(())
        } else {
            Err(CallError::UnknownCar(car))
        }
    }

    fn check_direction(&self, floor: u32, direction: Direction) -> Result<(), CallError> {
        let impossible = match direction {
            Direction::None => true,
            Direction::Up => floor >= self.num_floors,
            Direction::Down => floor <= 1,
        };
        if impossible {
            return Err(CallError::ImpossibleDirection { floor, direction });
        }
        Ok(())
    }

    fn insert_hall_call(
        &mut self,
        floor: u32,
        direction: Direction,
        destination: Option<u32>,
        now: u64,
    ) -> (CallId, bool) {
        if let Some(existing) = self.hall_calls.values().find(|c| {
            c.is_pending()
                && c.floor == floor
                && c.direction == direction
                && c.destination == destination
        }) {
            return (existing.id, false);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.hall_calls.insert(
            id,
            HallCall {
                id,
                floor,
                direction,
                destination,
                registered_at: now,
                assigned_car: None,
                assigned_at: None,
                committed: false,
                serviced_at: None,
                serviced_by: None,
            },
        );
        (id, true)
    }

    /// Registers a hall call, or returns the identical pending one. The flag is
    /// `true` only when a new call was created.
    pub fn register_hall_call(
        &mut self,
        floor: u32,
        direction: Direction,
        now: u64,
    ) -> Result<(CallId, bool), CallError> {
        self.check_floor(floor)?;
        self.check_direction(floor, direction)?;
        Ok(self.insert_hall_call(floor, direction, None, now))
    }

    /// Destination-control variant: one pending call per (floor, destination).
    pub fn register_destination_call(
        &mut self,
        floor: u32,
        destination: u32,
        now: u64,
    ) -> Result<(CallId, bool), CallError> {
        self.check_floor(floor)?;
        self.check_floor(destination)?;
        if destination == floor {
            return Err(CallError::DestinationIsOrigin { destination });
        }
        let direction = Direction::between(floor as f64, destination as f64);
        Ok(self.insert_hall_call(floor, direction, Some(destination), now))
    }

    pub fn hall_call(&self, id: CallId) -> Option<&HallCall> {
        self.hall_calls.get(&id).or_else(|| self.history.get(&id))
    }

    pub fn pending_hall_calls(&self) -> impl Iterator<Item = &HallCall> {
        self.hall_calls.values().filter(|c| c.is_pending())
    }

    pub fn pending_at(&self, floor: u32, direction: Direction) -> impl Iterator<Item = &HallCall> {
        self.pending_hall_calls()
            .filter(move |c| c.floor == floor && c.direction == direction)
    }

    /// Unassigned pending calls in registration order.
    pub fn unassigned_ids(&self) -> Vec<CallId> {
        self.pending_hall_calls()
            .filter(|c| c.assigned_car.is_none())
            .map(|c| c.id)
            .collect()
    }

    fn pending_mut(&mut self, id: CallId) -> Result<&mut HallCall, CallError> {
        match self.hall_calls.get_mut(&id) {
            Some(call) if call.is_pending() => Ok(call),
            Some(_) => Err(CallError::AlreadyServiced(id)),
            None if self.history.contains_key(&id) => Err(CallError::AlreadyServiced(id)),
            None => Err(CallError::UnknownHallCall(id)),
        }
    }

    /// Assigns (or reassigns) a pending call. Any forced move or move command
    /// outstanding for `car` is superseded.
    pub fn assign_hall_call(
        &mut self,
        id: CallId,
        car: CarId,
        now: u64,
    ) -> Result<AssignOutcome, CallError> {
        self.check_car(car)?;
        let call = self.pending_mut(id)?;
        let previous_car = call.assigned_car.filter(|prev| *prev != car);
        call.assigned_car = Some(car);
        call.assigned_at = Some(now);
        call.committed = false;
        Ok(AssignOutcome {
            previous_car,
            cleared_forced: self.forced.remove(&car),
            cancelled_move: self.moves.remove(&car),
        })
    }

    /// Drops the assignment so the call is dispatched again.
    pub fn release_hall_call(&mut self, id: CallId) -> Result<Option<CarId>, CallError> {
        let call = self.pending_mut(id)?;
        call.committed = false;
        Ok(call.assigned_car.take())
    }

    pub fn commit_hall_call(&mut self, id: CallId) -> Result<(), CallError> {
        let call = self.pending_mut(id)?;
        if call.assigned_car.is_some() {
            call.committed = true;
        }
        Ok(())
    }

    /// Drops the commitment of a call its car stopped for but did not serve; the
    /// assignment stays.
    pub fn uncommit_hall_call(&mut self, id: CallId) -> Result<(), CallError> {
        self.pending_mut(id)?.committed = false;
        Ok(())
    }

    /// Marks the call serviced by `car`. Service and clearance are one step, so a
    /// second clear is an error rather than a double count.
    pub fn clear_hall_call(
        &mut self,
        id: CallId,
        car: CarId,
        now: u64,
    ) -> Result<HallCall, CallError> {
        let call = self.pending_mut(id)?;
        if call.assigned_car.is_none() {
            call.assigned_car = Some(car);
            call.assigned_at = Some(now);
        }
        call.serviced_at = Some(now);
        call.serviced_by = Some(car);
        Ok(call.clone())
    }

    /// Moves serviced calls to history; returns how many were purged.
    pub fn purge_cleared(&mut self) -> usize {
        let serviced: Vec<CallId> = self
            .hall_calls
            .values()
            .filter(|c| !c.is_pending())
            .map(|c| c.id)
            .collect();
        for id in &serviced {
            if let Some(call) = self.hall_calls.remove(id) {
                self.history.insert(*id, call);
            }
        }
        if !serviced.is_empty() {
            debug!(count = serviced.len(), "purged serviced hall calls");
        }
        serviced.len()
    }

    pub fn serviced_hall_calls(&self) -> impl Iterator<Item = &HallCall> {
        self.history
            .values()
            .chain(self.hall_calls.values().filter(|c| !c.is_pending()))
    }

    /// Returns `true` when a new car call was created.
    pub fn register_car_call(
        &mut self,
        car: CarId,
        floor: u32,
        now: u64,
    ) -> Result<bool, CallError> {
        self.check_car(car)?;
        self.check_floor(floor)?;
        if self.car_calls.contains_key(&(car, floor)) {
            return Ok(false);
        }
        self.car_calls.insert(
            (car, floor),
            CarCall {
                car,
                floor,
                registered_at: now,
                serviced_at: None,
            },
        );
        Ok(true)
    }

    pub fn has_car_call(&self, car: CarId, floor: u32) -> bool {
        self.car_calls.contains_key(&(car, floor))
    }

    pub fn clear_car_call(
        &mut self,
        car: CarId,
        floor: u32,
        now: u64,
    ) -> Result<CarCall, CallError> {
        let mut call = self
            .car_calls
            .remove(&(car, floor))
            .ok_or(CallError::UnknownCarCall { car, floor })?;
        call.serviced_at = Some(now);
        self.car_call_history.push(call.clone());
        Ok(call)
    }

    pub fn serviced_car_calls(&self) -> &[CarCall] {
        &self.car_call_history
    }

    pub fn issue_forced_move(
        &mut self,
        car: CarId,
        floor: u32,
        direction: Direction,
        now: u64,
    ) -> Result<ForcedMove, CallError> {
        self.check_car(car)?;
        self.check_floor(floor)?;
        let command = ForcedMove {
            car,
            floor,
            direction,
            issued_at: now,
        };
        self.forced.insert(car, command);
        Ok(command)
    }

    pub fn forced_move(&self, car: CarId) -> Option<&ForcedMove> {
        self.forced.get(&car)
    }

    pub fn clear_forced_move(&mut self, car: CarId) -> Option<ForcedMove> {
        self.forced.remove(&car)
    }

    pub fn issue_move(
        &mut self,
        car: CarId,
        floor: u32,
        now: u64,
    ) -> Result<MoveCommand, CallError> {
        self.check_car(car)?;
        self.check_floor(floor)?;
        let command = MoveCommand {
            car,
            floor,
            issued_at: now,
        };
        self.moves.insert(car, command);
        Ok(command)
    }

    pub fn move_command(&self, car: CarId) -> Option<&MoveCommand> {
        self.moves.get(&car)
    }

    pub fn cancel_move(&mut self, car: CarId) -> Option<MoveCommand> {
        self.moves.remove(&car)
    }

    /// Whether `car` has any call of its own to serve (hall, car, or forced).
    pub fn has_work(&self, car: CarId) -> bool {
        self.car_calls.keys().any(|(c, _)| *c == car)
            || self.forced.contains_key(&car)
            || self
                .pending_hall_calls()
                .any(|call| call.assigned_car == Some(car))
    }

    pub fn view_for(&self, car: CarId) -> CarCallView {
        CarCallView {
            car_calls: self
                .car_calls
                .keys()
                .filter(|(c, _)| *c == car)
                .map(|(_, floor)| *floor)
                .collect(),
            hall_calls: self
                .pending_hall_calls()
                .filter(|call| call.assigned_car == Some(car))
                .map(|call| (call.floor, call.direction))
                .collect(),
            forced: self.forced.get(&car).map(|f| (f.floor, f.direction)),
            move_target: self.moves.get(&car).map(|m| m.floor),
        }
    }

    pub fn snapshot(&self, now: u64) -> CallSnapshot {
        CallSnapshot {
            taken_at: now,
            hall_calls: self.pending_hall_calls().cloned().collect(),
            car_calls: self.car_calls.values().cloned().collect(),
            forced_moves: self.forced.values().copied().collect(),
            move_commands: self.moves.values().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CallRegistry {
        CallRegistry::new(10, CallMode::Traditional, [0, 1])
    }

    #[test]
    fn identical_pending_hall_call_is_registered_once() {
        let mut calls = registry();
        let (first, created) = calls.register_hall_call(5, Direction::Up, 0).expect("first");
        assert!(created);
        let (second, created) = calls.register_hall_call(5, Direction::Up, 10).expect("second");
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(calls.pending_hall_calls().count(), 1);
        assert_eq!(calls.hall_call(first).map(|c| c.registered_at), Some(0));
    }

    #[test]
    fn opposite_directions_are_distinct_calls() {
        let mut calls = registry();
        let (up, _) = calls.register_hall_call(5, Direction::Up, 0).expect("up");
        let (down, _) = calls.register_hall_call(5, Direction::Down, 0).expect("down");
        assert_ne!(up, down);
    }

    #[test]
    fn impossible_hall_calls_are_rejected() {
        let mut calls = registry();
        assert_eq!(
            calls.register_hall_call(11, Direction::Down, 0),
            Err(CallError::FloorOutOfRange {
                floor: 11,
                num_floors: 10
            })
        );
        assert!(calls.register_hall_call(0, Direction::Up, 0).is_err());
        assert!(calls.register_hall_call(10, Direction::Up, 0).is_err());
        assert!(calls.register_hall_call(1, Direction::Down, 0).is_err());
        assert!(calls.register_hall_call(4, Direction::None, 0).is_err());
        assert!(calls.register_destination_call(4, 4, 0).is_err());
    }

    #[test]
    fn clearing_twice_is_an_invariant_violation() {
        let mut calls = registry();
        let (id, _) = calls.register_hall_call(3, Direction::Down, 0).expect("register");
        calls.assign_hall_call(id, 1, 100).expect("assign");
        let serviced = calls.clear_hall_call(id, 1, 900).expect("clear");
        assert_eq!(serviced.serviced_at, Some(900));
        assert_eq!(
            calls.clear_hall_call(id, 1, 901),
            Err(CallError::AlreadyServiced(id))
        );
        calls.purge_cleared();
        assert_eq!(
            calls.clear_hall_call(id, 1, 902),
            Err(CallError::AlreadyServiced(id))
        );
        assert_eq!(
            calls.assign_hall_call(id, 0, 903),
            Err(CallError::AlreadyServiced(id))
        );
    }

    #[test]
    fn uncommitting_keeps_the_assignment() {
        let mut calls = registry();
        let (id, _) = calls.register_hall_call(4, Direction::Down, 0).expect("register");
        calls.assign_hall_call(id, 1, 10).expect("assign");
        calls.commit_hall_call(id).expect("commit");
        assert!(calls.hall_call(id).is_some_and(|c| c.committed));
        calls.uncommit_hall_call(id).expect("uncommit");
        let call = calls.hall_call(id).expect("pending");
        assert!(!call.committed);
        assert_eq!(call.assigned_car, Some(1));
        calls.clear_hall_call(id, 1, 20).expect("clear");
        assert_eq!(calls.uncommit_hall_call(id), Err(CallError::AlreadyServiced(id)));
    }

    #[test]
    fn registering_after_service_creates_a_new_call() {
        let mut calls = registry();
        let (id, _) = calls.register_hall_call(3, Direction::Up, 0).expect("register");
        calls.clear_hall_call(id, 0, 5).expect("clear");
        let (again, created) = calls.register_hall_call(3, Direction::Up, 6).expect("again");
        assert!(created);
        assert_ne!(id, again);
    }

    #[test]
    fn assignment_supersedes_dispatcher_commands() {
        let mut calls = registry();
        calls
            .issue_forced_move(0, 1, Direction::Up, 0)
            .expect("forced");
        calls.issue_move(0, 4, 0).expect("move");
        let (id, _) = calls.register_hall_call(6, Direction::Up, 1).expect("register");
        let outcome = calls.assign_hall_call(id, 0, 2).expect("assign");
        assert_eq!(outcome.cleared_forced.map(|f| f.floor), Some(1));
        assert_eq!(outcome.cancelled_move.map(|m| m.floor), Some(4));
        assert!(calls.forced_move(0).is_none());
        assert!(calls.move_command(0).is_none());

        let outcome = calls.assign_hall_call(id, 1, 3).expect("reassign");
        assert_eq!(outcome.previous_car, Some(0));
        assert_eq!(calls.view_for(1).hall_calls, vec![(6, Direction::Up)]);
        assert!(calls.view_for(0).hall_calls.is_empty());
    }

    #[test]
    fn car_calls_are_idempotent_and_clear_once() {
        let mut calls = registry();
        assert_eq!(calls.register_car_call(0, 7, 0), Ok(true));
        assert_eq!(calls.register_car_call(0, 7, 1), Ok(false));
        assert!(calls.has_car_call(0, 7));
        assert!(calls.clear_car_call(0, 7, 2).is_ok());
        assert_eq!(
            calls.clear_car_call(0, 7, 3),
            Err(CallError::UnknownCarCall { car: 0, floor: 7 })
        );
        assert_eq!(calls.register_car_call(9, 7, 0), Err(CallError::UnknownCar(9)));
        assert_eq!(calls.serviced_car_calls().len(), 1);
    }

    #[test]
    fn destination_calls_are_keyed_by_destination() {
        let mut calls = CallRegistry::new(10, CallMode::DestinationControl, [0]);
        let (a, _) = calls.register_destination_call(1, 7, 0).expect("a");
        let (b, _) = calls.register_destination_call(1, 9, 0).expect("b");
        let (c, created) = calls.register_destination_call(1, 7, 1).expect("c");
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert!(!created);
        assert_eq!(calls.hall_call(b).map(|h| h.direction), Some(Direction::Up));
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let mut calls = registry();
        let (id, _) = calls.register_hall_call(2, Direction::Up, 0).expect("register");
        let snapshot = calls.snapshot(0);
        calls.assign_hall_call(id, 0, 1).expect("assign");
        assert_eq!(snapshot.unassigned().count(), 1);
        assert_eq!(calls.snapshot(1).unassigned().count(), 0);
    }
}
