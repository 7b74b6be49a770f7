//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], inserts it as [CurrentEvent],
//! then runs the schedule. Exactly one event system matches any event kind.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::{ExecutorKind, IntoSystemConfigs};
use tracing::trace;

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::error::{SimError, SimFaults};
use crate::profiling::EventMetrics;
use crate::scenario::SimulationEndTimeMs;
use crate::systems::{
    car_replan::car_replan_system,
    door::{door_closed_system, door_obstruction_system, door_opened_system},
    group_control::group_control_system,
    hall_button::hall_button_system,
    movement::{arrive_system, decelerate_system, floor_passed_system},
    passenger_arrival::passenger_arrival_system,
    passenger_transfer::passenger_transfer_system,
    spawner::{passenger_spawner_system, simulation_started_system},
};

/// Run condition matching the current event's kind.
fn event_is(kind: EventKind) -> impl Fn(Option<Res<CurrentEvent>>) -> bool + Clone {
    move |event: Option<Res<CurrentEvent>>| event.is_some_and(|e| e.0.kind == kind)
}

// Dispatch passes and repositioning rechecks share the group controller.
fn is_group_control_pass(event: Option<Res<CurrentEvent>>) -> bool {
    event.is_some_and(|e| matches!(e.0.kind, EventKind::Dispatch | EventKind::RepositionCheck))
}

/// Pops and processes the next event if it is due.
///
/// Returns `Ok(false)` when the queue is empty or the next event lies beyond
/// [SimulationEndTimeMs] (events exactly at the end time still run). A call
/// registry invariant violation recorded during the step aborts the run.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> Result<bool, SimError> {
    let stop_at = world.get_resource::<SimulationEndTimeMs>().map(|e| e.0);
    run_next_event_until(world, schedule, stop_at)
}

fn run_next_event_until(
    world: &mut World,
    schedule: &mut Schedule,
    stop_at: Option<u64>,
) -> Result<bool, SimError> {
    let next_ts = world.resource_mut::<SimulationClock>().next_event_time();
    match (stop_at, next_ts) {
        (_, None) => return Ok(false),
        (Some(end_ms), Some(ts)) if ts > end_ms => return Ok(false),
        _ => {}
    }

    let Some(event) = world.resource_mut::<SimulationClock>().pop_next() else {
        return Ok(false);
    };
    trace!(t = event.timestamp, kind = ?event.kind, subject = ?event.subject, "event");
    world.insert_resource(CurrentEvent(event));

    if let Some(mut metrics) = world.get_resource_mut::<EventMetrics>() {
        metrics.record_event(event.kind);
    }

    schedule.run(world);

    if let Some(fault) = world
        .get_resource_mut::<SimFaults>()
        .and_then(|mut faults| faults.take_first())
    {
        return Err(SimError::Invariant(fault));
    }
    Ok(true)
}

/// Runs one step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(
    world: &mut World,
    schedule: &mut Schedule,
    mut hook: F,
) -> Result<bool, SimError>
where
    F: FnMut(&World, &Event),
{
    let processed = run_next_event(world, schedule)?;
    if processed {
        let event = world.resource::<CurrentEvent>().0;
        hook(world, &event);
    }
    Ok(processed)
}

/// Runs steps until the queue is empty (or the end time is reached) or
/// `max_steps` is hit. Returns the number of steps executed.
pub fn run_until_empty(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
) -> Result<usize, SimError> {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule)? {
        steps += 1;
    }
    Ok(steps)
}

/// Processes every event with a timestamp at or before `end_ms`.
pub fn run_until(world: &mut World, schedule: &mut Schedule, end_ms: u64) -> Result<usize, SimError> {
    let limit = world
        .get_resource::<SimulationEndTimeMs>()
        .map_or(end_ms, |e| e.0.min(end_ms));
    let mut steps = 0;
    while run_next_event_until(world, schedule, Some(limit))? {
        steps += 1;
    }
    Ok(steps)
}

/// Builds the simulation schedule: one event-gated system per event kind.
///
/// The schedule runs single-threaded with systems chained so a run is
/// reproducible; deferred commands (spawned passengers, despawns) are applied
/// at the end of every step.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);

    schedule.add_systems(
        (
            simulation_started_system.run_if(event_is(EventKind::SimulationStarted)),
            passenger_spawner_system.run_if(event_is(EventKind::SpawnPassenger)),
            passenger_arrival_system.run_if(event_is(EventKind::PassengerArrival)),
            hall_button_system.run_if(event_is(EventKind::HallButtonPress)),
            group_control_system.run_if(is_group_control_pass),
            car_replan_system.run_if(event_is(EventKind::CarReplan)),
            floor_passed_system.run_if(event_is(EventKind::CarFloorPassed)),
            decelerate_system.run_if(event_is(EventKind::CarDecelerate)),
            arrive_system.run_if(event_is(EventKind::CarArrive)),
            door_opened_system.run_if(event_is(EventKind::DoorOpened)),
            passenger_transfer_system.run_if(event_is(EventKind::PassengerTransfer)),
            door_closed_system.run_if(event_is(EventKind::DoorClosed)),
            door_obstruction_system.run_if(event_is(EventKind::DoorObstruction)),
        )
            .chain(),
    );

    schedule
}

/// Schedules `SimulationStarted` at time 0. Call after building the scenario
/// and before running events.
pub fn initialize_simulation(world: &mut World) {
    let mut clock = world.resource_mut::<SimulationClock>();
    clock.schedule_at(0, EventKind::SimulationStarted, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{build_scenario, ScenarioParams};

    #[test]
    fn empty_scenario_runs_only_the_start_pass() {
        let mut world = World::new();
        build_scenario(&mut world, ScenarioParams::default()).expect("valid");
        initialize_simulation(&mut world);
        let mut schedule = simulation_schedule();

        let steps = run_until_empty(&mut world, &mut schedule, 100).expect("no faults");
        // SimulationStarted then one Dispatch pass.
        assert_eq!(steps, 2);
        let metrics = world.resource::<EventMetrics>();
        assert_eq!(metrics.count(EventKind::Dispatch), 1);
    }

    #[test]
    fn run_until_stops_at_the_end_time() {
        let mut world = World::new();
        build_scenario(
            &mut world,
            ScenarioParams::default().with_passenger(5.0, 1, 3),
        )
        .expect("valid");
        initialize_simulation(&mut world);
        let mut schedule = simulation_schedule();

        run_until(&mut world, &mut schedule, 4_000).expect("no faults");
        assert!(world.resource::<SimulationClock>().now() <= 4_000);
        assert!(!world.resource::<SimulationClock>().is_empty());
    }

    #[test]
    fn recorded_fault_aborts_the_step() {
        let mut world = World::new();
        build_scenario(&mut world, ScenarioParams::default()).expect("valid");
        initialize_simulation(&mut world);
        world
            .resource_mut::<SimFaults>()
            .record(crate::error::CallError::UnknownCar(7));
        let mut schedule = simulation_schedule();

        let err = run_next_event(&mut world, &mut schedule).expect_err("fault surfaces");
        assert_eq!(
            err,
            SimError::Invariant(crate::error::CallError::UnknownCar(7))
        );
    }
}
