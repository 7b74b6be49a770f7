//! Start-of-run and traffic systems: queue scripted arrivals and generate passengers.

use bevy_ecs::prelude::{Commands, Res, ResMut};
use tracing::debug;

use crate::clock::{secs_to_ms, EventKind, EventSubject, SimulationClock};
use crate::dispatch::DispatchState;
use crate::ecs::{NextPassengerId, Passenger};
use crate::scenario::{PassengerTiming, PendingHallCalls, PendingPassengers};
use crate::spawner::PassengerSpawner;

/// Reacts to `SimulationStarted`: spawns scripted passengers (still pending),
/// queues their arrivals and hall-button presses, starts the traffic spawner,
/// and runs a first dispatch pass so repositioning sees the idle fleet.
#[allow(clippy::too_many_arguments)]
pub fn simulation_started_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    mut dispatch: ResMut<DispatchState>,
    mut passengers: ResMut<PendingPassengers>,
    mut hall_calls: ResMut<PendingHallCalls>,
    mut ids: ResMut<NextPassengerId>,
    timing: Res<PassengerTiming>,
    spawner: Option<ResMut<PassengerSpawner>>,
) {
    for scripted in passengers.0.drain(..) {
        let passenger = Passenger::new(ids.allocate(), scripted.origin, scripted.destination)
            .with_transfer_times(timing.boarding_secs, timing.alighting_secs);
        let entity = commands.spawn(passenger).id();
        clock.schedule_at(
            secs_to_ms(scripted.arrival_secs),
            EventKind::PassengerArrival,
            Some(EventSubject::Passenger(entity)),
        );
    }

    for call in hall_calls.0.drain(..) {
        clock.schedule_at(
            secs_to_ms(call.at_secs),
            EventKind::HallButtonPress,
            Some(EventSubject::Hall {
                floor: call.floor,
                direction: call.direction,
            }),
        );
    }

    if let Some(mut spawner) = spawner {
        if !spawner.initialized {
            spawner.initialized = true;
            if spawner.has_next() {
                clock.schedule_at(spawner.next_spawn_time_ms(), EventKind::SpawnPassenger, None);
            }
        }
    }

    dispatch.request(&mut clock);
}

/// Generates one passenger per `SpawnPassenger` event and schedules the next.
pub fn passenger_spawner_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    mut spawner: ResMut<PassengerSpawner>,
    mut ids: ResMut<NextPassengerId>,
) {
    let now = clock.now();
    if !spawner.should_spawn(now) {
        return;
    }

    let (origin, destination) = spawner.sample_trip();
    let timing = spawner.timing();
    let passenger = Passenger::new(ids.allocate(), origin, destination)
        .with_transfer_times(timing.boarding_secs, timing.alighting_secs);
    let id = passenger.id;
    let entity = commands.spawn(passenger).id();
    clock.schedule_at(
        now,
        EventKind::PassengerArrival,
        Some(EventSubject::Passenger(entity)),
    );
    debug!(passenger = id, origin, destination, "passenger generated");

    spawner.advance(now);
    if spawner.has_next() {
        clock.schedule_at(spawner.next_spawn_time_ms(), EventKind::SpawnPassenger, None);
    }
}
