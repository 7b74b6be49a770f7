mod support;

use bevy_ecs::prelude::World;
use elevator_core::bus::{BusEventType, FnSubscriber};
use elevator_core::calls::CallRegistry;
use elevator_core::ecs::CarRoster;
use elevator_core::error::ConfigError;
use elevator_core::scenario::{build_scenario, ScenarioParams, TrafficPatternKind};
use elevator_core::simulation::ElevatorSimulation;
use elevator_core::spawner::PassengerSpawner;
use std::sync::{Arc, Mutex};
use support::schedule::ScheduleRunner;
use support::world::traffic_building;

#[test]
fn scenario_loads_from_partial_json() {
    let json = r#"{
        "seed": 9,
        "building": {"num_floors": 15},
        "cars": [{"capacity": 6}, {"capacity": 6, "start_floor": 8}],
        "traffic": {"pattern": "up_peak", "arrival_rate": 0.2},
        "dispatch": {"allocation": "earliest_arrival",
                     "repositioning": {"kind": "lobby_return", "idle_delay_secs": 30.0}}
    }"#;
    let params: ScenarioParams = serde_json::from_str(json).expect("valid json");
    assert_eq!(params.building.num_floors, 15);
    assert_eq!(params.building.floor_height, 3.5);
    assert_eq!(params.cars[1].start(), 8);
    assert_eq!(
        params.traffic.as_ref().map(|t| t.pattern),
        Some(TrafficPatternKind::UpPeak)
    );

    let mut world = World::new();
    build_scenario(&mut world, params).expect("valid scenario");
    assert_eq!(world.resource::<CarRoster>().len(), 2);
    assert!(world.get_resource::<PassengerSpawner>().is_some());
    assert!(world.resource::<CallRegistry>().pending_hall_calls().next().is_none());
}

#[test]
fn invalid_configuration_fails_before_any_event() {
    let params = ScenarioParams::default()
        .with_floors(5)
        .with_passenger(0.0, 2, 9);
    let err = ElevatorSimulation::new(params).err().expect("rejected");
    assert!(matches!(err, ConfigError::InvalidScriptedPassenger { index: 0, .. }));
}

#[test]
fn end_time_bounds_the_run() {
    let params = traffic_building(4, TrafficPatternKind::Uniform).with_end_time_secs(60.0);
    let mut sim = ElevatorSimulation::new(params).expect("valid");
    sim.run_to_completion(1_000_000).expect("no faults");
    assert!(sim.now_secs() <= 60.0);
}

#[test]
fn subscribers_see_messages_synchronously_in_order() {
    let mut sim = ElevatorSimulation::new(
        ScenarioParams::default().with_passenger(0.0, 1, 4),
    )
    .expect("valid");
    let seen: Arc<Mutex<Vec<(f64, BusEventType)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    sim.subscribe(Box::new(FnSubscriber(move |m: &elevator_core::bus::BusMessage| {
        if let Ok(mut guard) = sink.lock() {
            guard.push((m.time, m.kind));
        }
    })));

    sim.step().expect("start event");
    assert!(seen.lock().expect("lock").is_empty(), "nothing is published at start");
    sim.step().expect("arrival");
    {
        let seen = seen.lock().expect("lock");
        assert_eq!(seen[0], (0.0, BusEventType::PassengerWaiting));
        assert_eq!(seen[1], (0.0, BusEventType::HallCallRegistered));
    }

    sim.run_to_completion(10_000).expect("no faults");
    let seen = seen.lock().expect("lock");
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn schedule_runner_drains_a_scripted_run() {
    let mut world = elevator_core::test_helpers::create_test_world(
        ScenarioParams::default().with_passenger(2.0, 3, 1),
    );
    let mut runner = ScheduleRunner::new();
    assert!(runner.run_one(&mut world));
    let steps = runner.run_full(&mut world);
    assert!(steps > 10);
    assert!(!runner.run_one(&mut world));
}
