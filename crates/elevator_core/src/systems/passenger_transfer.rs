//! Boarding and alighting while the door is open.
//!
//! One passenger moves per event; each transfer reschedules the loop after that
//! passenger's transfer time. Alighting goes first. When nobody is left to
//! move the door dwells once, then starts closing.

use std::collections::BTreeSet;

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::debug;

use crate::bus::{passenger_payload, BusEventType, DoorEventType};
use crate::calls::{CallId, CallMode};
use crate::clock::{secs_to_ms, CurrentEvent, EventKind, EventSubject};
use crate::ecs::{Car, Door, DoorState, FloorQueues, Passenger, PassengerState};
use crate::systems::CarContext;
use crate::telemetry::CompletedJourney;

pub fn passenger_transfer_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    mut queues: ResMut<FloorQueues>,
    mut cars: Query<(&mut Car, &mut Door)>,
    mut passengers: Query<&mut Passenger>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut car, mut door)) = cars.get_mut(entity) else {
        return;
    };
    if door.state != DoorState::Open {
        return;
    }
    let now = ctx.now();
    let floor = car.floor;
    let subject = Some(EventSubject::Car(entity));

    let alighting = car
        .onboard
        .iter()
        .copied()
        .find(|p| passengers.get(*p).is_ok_and(|p| p.destination == floor));
    if let Some(leaving) = alighting {
        car.onboard.retain(|p| *p != leaving);
        let Ok(mut passenger) = passengers.get_mut(leaving) else {
            return;
        };
        passenger.state = PassengerState::Arrived;
        passenger.alighting_time = Some(now);
        ctx.bus.publish(
            now,
            BusEventType::PassengerAlighting,
            &passenger_payload(
                passenger.id,
                floor,
                passenger.destination,
                passenger.direction(),
                Some(car.id),
            ),
        );
        if let (Some(call_time), Some(boarding_time)) = (passenger.call_time, passenger.boarding_time) {
            ctx.telemetry.completed_journeys.push(CompletedJourney {
                passenger: passenger.id,
                car: car.id,
                origin: passenger.origin,
                destination: passenger.destination,
                call_time,
                boarding_time,
                alighting_time: now,
            });
        }
        let delay = secs_to_ms(passenger.alighting_secs);
        commands.entity(leaving).despawn();
        ctx.clock
            .schedule_in(delay, EventKind::PassengerTransfer, subject);
        return;
    }

    let serving = car.serving;
    if !car.is_full() {
        let eligible: Vec<Entity> = queues
            .waiting(floor, serving)
            .filter(|p| passengers.get(*p).is_ok_and(|p| car.serves(p.destination)))
            .collect();
        if let Some(&boarder) = eligible.first() {
            if ctx.registry.mode() == CallMode::DestinationControl && !door.boarded_this_stop {
                // Destinations are known at the hall: light them all up front.
                let preview: Vec<u32> = eligible
                    .iter()
                    .take(car.free_capacity() as usize)
                    .filter_map(|p| passengers.get(*p).ok().map(|p| p.destination))
                    .collect();
                for destination in preview {
                    ctx.register_car_call(car.id, destination);
                }
            }
            door.boarded_this_stop = true;
            door.dwell_waited = false;
            queues.remove(floor, serving, boarder);
            let Ok(mut passenger) = passengers.get_mut(boarder) else {
                return;
            };
            passenger.state = PassengerState::Riding;
            passenger.boarding_time = Some(now);
            passenger.car = Some(entity);
            car.onboard.push(boarder);
            ctx.telemetry.record_load(car.id, car.load());
            ctx.bus.publish(
                now,
                BusEventType::PassengerBoarding,
                &passenger_payload(
                    passenger.id,
                    floor,
                    passenger.destination,
                    passenger.direction(),
                    Some(car.id),
                ),
            );
            ctx.register_car_call(car.id, passenger.destination);
            let delay = secs_to_ms(passenger.boarding_secs);
            ctx.clock
                .schedule_in(delay, EventKind::PassengerTransfer, subject);
            return;
        }
    }

    if !door.dwell_waited {
        door.dwell_waited = true;
        let dwell = secs_to_ms(ctx.door_config.dwell_secs);
        ctx.clock
            .schedule_in(dwell, EventKind::PassengerTransfer, subject);
        return;
    }

    // Close-start. Anyone still waiting in the served direction keeps (or gets
    // back) a registered hall call, released from this car.
    let leftovers: Vec<Entity> = queues.waiting(floor, serving).collect();
    let mut kept: BTreeSet<CallId> = BTreeSet::new();
    for waiting in leftovers {
        let Ok(passenger) = passengers.get(waiting) else {
            continue;
        };
        let (origin, direction, destination) =
            (passenger.origin, passenger.direction(), passenger.destination);
        let call = ctx.register_passenger_call(origin, direction, destination);
        if let Ok(mut passenger) = passengers.get_mut(waiting) {
            passenger.hall_call = call;
        }
        kept.extend(call);
    }
    for &id in &kept {
        let ours = ctx
            .registry
            .hall_call(id)
            .is_some_and(|call| call.assigned_car == Some(car.id));
        if ours {
            let result = ctx.registry.release_hall_call(id);
            ctx.faults.check(result);
        }
        if !car.is_full() {
            ctx.dispatch.decline(id, car.id);
        }
    }
    let served: Vec<CallId> = ctx
        .registry
        .pending_at(floor, serving)
        .map(|call| call.id)
        .filter(|id| !kept.contains(id))
        .collect();
    for id in served {
        ctx.service_hall_call(id, &car);
    }
    // Calls here the car stopped for but leaves unserved are open to other cars again.
    let unserved: Vec<CallId> = ctx
        .registry
        .pending_hall_calls()
        .filter(|call| call.floor == floor && call.committed && call.assigned_car == Some(car.id))
        .map(|call| call.id)
        .collect();
    for id in unserved {
        let result = ctx.registry.uncommit_hall_call(id);
        ctx.faults.check(result);
    }
    if !kept.is_empty() {
        debug!(car = car.id, floor, left_behind = kept.len(), "closing with passengers waiting");
    }

    door.state = DoorState::Closing;
    ctx.door_event(&car, DoorEventType::ClosingStart);
    let close = secs_to_ms(ctx.door_config.close_secs);
    door.close_event = Some(
        ctx.clock
            .schedule_in(close, EventKind::DoorClosed, subject),
    );
    ctx.request_dispatch();
}
