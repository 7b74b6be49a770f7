//! Shared car/door transitions used by the event systems.
//!
//! Every transition that changes what an observer can see publishes exactly one
//! bus message, in the order the transitions happen.

use bevy_ecs::prelude::{Entity, Res, ResMut};
use bevy_ecs::system::SystemParam;
use tracing::debug;

use crate::bus::{
    BusEventType, CarCallPayload, DoorEventType, ElevatorStatus, EventBus, FullLoadBypassPayload,
    HallCallOffPayload, HallCallPayload,
};
use crate::calls::{CallId, CallMode, CallRegistry};
use crate::clock::{secs_to_ms, EventKind, EventSubject, SimulationClock};
use crate::dispatch::{DemandHistory, DispatchState};
use crate::ecs::{Car, CarId, CarRoster, CarTrip, Direction, Door, DoorState, MotionPhase};
use crate::error::SimFaults;
use crate::kinematics::SCurveProfile;
use crate::scenario::{BuildingConfig, DoorConfig};
use crate::stops::StopPlanner;
use crate::telemetry::{ServicedHallCallRecord, SimTelemetry};

#[derive(SystemParam)]
pub struct CarContext<'w> {
    pub clock: ResMut<'w, SimulationClock>,
    pub registry: ResMut<'w, CallRegistry>,
    pub bus: ResMut<'w, EventBus>,
    pub dispatch: ResMut<'w, DispatchState>,
    pub demand: ResMut<'w, DemandHistory>,
    pub faults: ResMut<'w, SimFaults>,
    pub telemetry: ResMut<'w, SimTelemetry>,
    pub roster: Res<'w, CarRoster>,
    pub building: Res<'w, BuildingConfig>,
    pub door_config: Res<'w, DoorConfig>,
}

impl CarContext<'_> {
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn request_dispatch(&mut self) {
        self.dispatch.request(&mut self.clock);
    }

    pub fn replan_entity(&mut self, entity: Entity) {
        let now = self.now();
        self.clock
            .schedule_at(now, EventKind::CarReplan, Some(EventSubject::Car(entity)));
    }

    pub fn replan(&mut self, car: CarId) {
        if let Some(entity) = self.roster.entity(car) {
            self.replan_entity(entity);
        }
    }

    pub fn publish_status(&mut self, car: &Car, door: &Door) {
        let now = self.now();
        let status = ElevatorStatus {
            car: car.id,
            floor: car.position_at(now, self.building.floor_height),
            direction: car.direction,
            phase: car.phase,
            door: door.state,
            load: car.load(),
            capacity: car.capacity,
            target: car.trip.as_ref().map(|t| t.target),
        };
        self.bus.publish(now, BusEventType::ElevatorStatus, &status);
    }

    pub fn door_event(&mut self, car: &Car, event_type: DoorEventType) {
        let now = self.now();
        self.bus.door_event(now, car.id, car.floor, event_type);
    }

    /// Registers the hall call a waiting passenger implies and publishes it if new.
    pub fn register_passenger_call(
        &mut self,
        floor: u32,
        direction: Direction,
        destination: u32,
    ) -> Option<CallId> {
        let now = self.now();
        let registration = match self.registry.mode() {
            CallMode::Traditional => self.registry.register_hall_call(floor, direction, now),
            CallMode::DestinationControl => {
                self.registry.register_destination_call(floor, destination, now)
            }
        };
        let (id, created) = self.faults.check(registration)?;
        if created {
            self.publish_hall_call(id);
        }
        Some(id)
    }

    pub fn publish_hall_call(&mut self, id: CallId) {
        let Some(call) = self.registry.hall_call(id).cloned() else {
            return;
        };
        let now = self.now();
        self.demand.record(now, call.floor);
        self.bus.publish(
            now,
            BusEventType::HallCallRegistered,
            &HallCallPayload {
                call: id,
                floor: call.floor,
                direction: call.direction,
                destination: call.destination,
            },
        );
        debug!(call = id, floor = call.floor, direction = ?call.direction, "hall call registered");
    }

    /// Registers a car call for `car` and publishes it if new.
    pub fn register_car_call(&mut self, car: CarId, floor: u32) {
        let now = self.now();
        let result = self.registry.register_car_call(car, floor, now);
        if self.faults.check(result) == Some(true) {
            self.bus.publish(
                now,
                BusEventType::CarCallRegistered,
                &CarCallPayload { car, floor },
            );
        }
    }

    /// Clears a pending hall call as serviced by `car` at its current stop.
    pub fn service_hall_call(&mut self, id: CallId, car: &Car) {
        let now = self.now();
        let previous = self.registry.hall_call(id).and_then(|c| c.assigned_car);
        let result = self.registry.clear_hall_call(id, car.id, now);
        let Some(call) = self.faults.check(result) else {
            return;
        };
        self.bus.publish(
            now,
            BusEventType::HallCallOff,
            &HallCallOffPayload {
                call: id,
                floor: call.floor,
                direction: call.direction,
                car: car.id,
            },
        );
        self.telemetry
            .serviced_hall_calls
            .push(ServicedHallCallRecord {
                call: id,
                floor: call.floor,
                direction: call.direction,
                car: car.id,
                car_floor: car.floor,
                served_direction: car.serving,
                registered_at: call.registered_at,
                serviced_at: now,
            });
        if let Some(other) = previous.filter(|p| *p != car.id) {
            self.replan(other);
        }
    }

    /// IDLE/arrival → STOPPING at the car's current floor; the door starts opening.
    pub fn begin_stop(&mut self, entity: Entity, car: &mut Car, door: &mut Door) {
        car.phase = MotionPhase::Stopping;
        car.serving = Direction::None;
        car.trip = None;
        car.idle_since = None;
        door.state = DoorState::Opening;
        door.reopen_count = 0;
        door.close_event = None;
        door.dwell_waited = false;
        door.boarded_this_stop = false;
        self.publish_status(car, door);
        self.door_event(car, DoorEventType::OpeningStart);

        if self.registry.has_car_call(car.id, car.floor) {
            let now = self.now();
            let result = self.registry.clear_car_call(car.id, car.floor, now);
            if self.faults.check(result).is_some() {
                self.bus.publish(
                    now,
                    BusEventType::CarCallOff,
                    &CarCallPayload {
                        car: car.id,
                        floor: car.floor,
                    },
                );
            }
        }
        let open = secs_to_ms(self.door_config.open_secs);
        self.clock
            .schedule_in(open, EventKind::DoorOpened, Some(EventSubject::Car(entity)));
        debug!(car = car.id, floor = car.floor, "stopping");
    }

    /// Schedules the floor-passing, braking, and arrival events of `trip`,
    /// skipping floors already passed `elapsed_secs` into it.
    fn schedule_trip_events(&mut self, entity: Entity, trip: &mut CarTrip, elapsed_secs: f64) {
        let now = self.now();
        let subject = Some(EventSubject::Car(entity));
        let departed_at = trip.departed_at;
        let at = |secs: f64| departed_at.saturating_add(secs_to_ms(secs)).max(now);
        let floors = trip.origin.abs_diff(trip.target);
        let h = self.building.floor_height;

        let mut floor_events = Vec::new();
        for passed in 1..floors {
            let t = trip.profile.time_to_reach(passed as f64 * h);
            if t > elapsed_secs {
                floor_events.push(self.clock.schedule_at(
                    at(t),
                    EventKind::CarFloorPassed,
                    subject,
                ));
            }
        }
        let decelerate = at(trip.profile.deceleration_start());
        let arrive = at(trip.profile.total_time()).max(decelerate);
        trip.floor_events = floor_events;
        trip.decelerate_event =
            Some(self.clock.schedule_at(decelerate, EventKind::CarDecelerate, subject));
        trip.arrive_event = Some(self.clock.schedule_at(arrive, EventKind::CarArrive, subject));
    }

    /// IDLE/STOPPING → MOVING toward `target`.
    pub fn depart(
        &mut self,
        entity: Entity,
        car: &mut Car,
        door: &Door,
        target: u32,
        move_only: bool,
    ) {
        let origin = car.floor;
        let distance = (target as f64 - origin as f64) * self.building.floor_height;
        let mut trip = CarTrip {
            origin,
            target,
            departed_at: self.now(),
            profile: SCurveProfile::new(distance, car.limits),
            move_only,
            decelerate_event: None,
            arrive_event: None,
            floor_events: Vec::new(),
        };
        self.schedule_trip_events(entity, &mut trip, 0.0);
        car.direction = trip.direction();
        car.phase = MotionPhase::Moving;
        car.serving = Direction::None;
        car.idle_since = None;
        car.trip = Some(trip);
        self.publish_status(car, door);
        debug!(car = car.id, from = origin, to = target, move_only, "departing");
    }

    /// Swaps a moving car's profile to stop at `target` instead, if the new
    /// profile matches the car's current motion. Returns whether it swapped.
    pub fn retarget(&mut self, entity: Entity, car: &mut Car, door: &Door, target: u32) -> bool {
        let now = self.now();
        let Some(trip) = car.trip.as_ref() else {
            return false;
        };
        let elapsed = trip.elapsed_secs(now);
        let distance = (target as f64 - trip.origin as f64) * self.building.floor_height;
        let profile = SCurveProfile::new(distance, car.limits);
        if !profile.agrees_with(&trip.profile, elapsed) || elapsed > profile.deceleration_start() {
            return false;
        }

        let stale: Vec<_> = trip.scheduled_events().collect();
        for id in stale {
            self.clock.cancel(id);
        }
        let mut next = CarTrip {
            origin: trip.origin,
            target,
            departed_at: trip.departed_at,
            profile,
            move_only: false,
            decelerate_event: None,
            arrive_event: None,
            floor_events: Vec::new(),
        };
        let previous_target = trip.target;
        self.schedule_trip_events(entity, &mut next, elapsed);
        car.trip = Some(next);
        self.publish_status(car, door);
        debug!(car = car.id, from = previous_target, to = target, "retargeted");
        true
    }

    /// Picks the next action for a car at rest at its floor: open for a call
    /// here, depart for the next stop, or follow a move command. Returns `false`
    /// when there is nothing to do.
    pub fn resume(
        &mut self,
        entity: Entity,
        car: &mut Car,
        door: &mut Door,
        heading: Direction,
    ) -> bool {
        let view = self.registry.view_for(car.id);
        let planner = StopPlanner::new(&view, car.is_full(), car.full_load_bypass);
        let direction = planner.decide_direction(car.floor, heading);

        if direction != Direction::None && planner.call_at(car.floor, direction) {
            car.direction = direction;
            self.begin_stop(entity, car, door);
            return true;
        }
        if direction != Direction::None {
            if let Some(target) = planner.next_stop(car.floor as f64, direction) {
                let skipped = planner.bypassed_between(car.floor, target, direction);
                if !skipped.is_empty() {
                    let now = self.now();
                    self.bus.publish(
                        now,
                        BusEventType::FullLoadBypass,
                        &FullLoadBypassPayload {
                            car: car.id,
                            direction,
                            floors: skipped,
                        },
                    );
                }
                self.depart(entity, car, door, target, false);
                return true;
            }
        }
        if let Some(target) = view.move_target {
            if target != car.floor {
                self.depart(entity, car, door, target, true);
                return true;
            }
            self.registry.cancel_move(car.id);
        }
        false
    }

    /// → IDLE with direction NONE.
    pub fn settle_idle(&mut self, car: &mut Car, door: &Door) {
        car.phase = MotionPhase::Idle;
        car.direction = Direction::None;
        car.serving = Direction::None;
        car.trip = None;
        car.idle_since = Some(self.now());
        self.publish_status(car, door);
        debug!(car = car.id, floor = car.floor, "idle");
    }

    /// CLOSING → OPENING, bounded by `max_reopens` per stop.
    pub fn reopen(&mut self, entity: Entity, car: &Car, door: &mut Door) -> bool {
        if door.state != DoorState::Closing || door.reopen_count >= self.door_config.max_reopens {
            return false;
        }
        if let Some(close) = door.close_event.take() {
            self.clock.cancel(close);
        }
        door.state = DoorState::Opening;
        door.reopen_count += 1;
        door.dwell_waited = false;
        self.door_event(car, DoorEventType::Reopening);
        let delay = secs_to_ms(self.door_config.reopen_delay_secs);
        self.clock
            .schedule_in(delay, EventKind::DoorOpened, Some(EventSubject::Car(entity)));
        debug!(car = car.id, floor = car.floor, count = door.reopen_count, "door reopening");
        true
    }
}
