mod support;

use elevator_core::bus::BusEventType;
use elevator_core::ecs::Direction;
use elevator_core::kinematics::SCurveProfile;
use elevator_core::scenario::{AllocationKind, CarConfig, ScenarioParams};
use elevator_core::test_helpers::{run_logged, same_time};
use support::log::{car_of, is_door, is_hall, is_status, position};
use support::world::{one_car_building, reassignment_enabled};

#[test]
fn single_hall_call_publishes_in_causal_order() {
    let params = one_car_building().with_hall_call(0.0, 5, Direction::Up);
    let travel = SCurveProfile::new(4.0 * params.building.floor_height, params.cars[0].limits())
        .total_time();
    let open = params.door.open_secs;
    let (_, log) = run_logged(params);
    let messages = log.messages();

    let registered = position(&messages, |m| {
        is_hall(m, BusEventType::HallCallRegistered, 5, "UP")
    })
    .expect("hall_call_registered");
    let assigned = position(&messages, |m| {
        is_hall(m, BusEventType::HallCallAssignment, 5, "UP")
    })
    .expect("hall_call_assignment");
    let moving = position(&messages, |m| is_status(m, 0, "MOVING")).expect("MOVING status");
    let stopping = position(&messages, |m| is_status(m, 0, "STOPPING")).expect("STOPPING status");
    let opening = position(&messages, |m| is_door(m, 0, 5, "OPENING_START")).expect("OPENING_START");
    let off = position(&messages, |m| is_hall(m, BusEventType::HallCallOff, 5, "UP"))
        .expect("hall_call_off");

    assert!(registered < assigned);
    assert!(assigned < moving);
    assert!(moving < stopping);
    assert!(stopping < opening);
    assert!(opening < off);

    assert_eq!(messages[registered].time, 0.0);
    assert_eq!(messages[assigned].time, 0.0);
    assert_eq!(messages[moving].time, 0.0);
    assert!(
        same_time(messages[stopping].time, travel),
        "stopped at {} instead of {travel}",
        messages[stopping].time
    );
    assert!(same_time(messages[opening].time, travel));
    assert!(same_time(messages[off].time, travel + open));

    // Position updates while travelling, strictly between floors 1 and 5.
    let updates: Vec<f64> = messages[moving + 1..stopping]
        .iter()
        .filter(|m| m.kind == BusEventType::ElevatorStatus)
        .filter_map(|m| m.data["floor"].as_f64())
        .collect();
    assert!(updates.len() >= 3, "expected floor-passing updates, got {updates:?}");
    assert!(updates.windows(2).all(|w| w[0] <= w[1]));
    assert!(updates.iter().all(|f| *f > 1.0 && *f < 5.0));
}

/// Car 0 (capacity 1) carries a passenger from floor 10 down to 3 and is full
/// until the door opens there at 20.8 s; it goes idle at 3 at 24.8 s. Car 1 is
/// a slow car at the lobby and is the only eligible car when the UP call at
/// floor 3 is raised at `call_secs`. Its 7 m trip brakes from 7.0 s to 12.5 s.
fn slow_car_race(call_secs: f64) -> ScenarioParams {
    let slow = CarConfig {
        rated_speed: 1.0,
        acceleration: 0.2,
        jerk: 0.4,
        ..CarConfig::default()
    };
    ScenarioParams::default()
        .with_floors(10)
        .with_car_configs(vec![
            CarConfig::default().with_capacity(1).with_start_floor(10),
            slow.with_start_floor(1),
        ])
        .with_allocation(AllocationKind::EarliestArrival)
        .with_reassignment(reassignment_enabled())
        .with_passenger(0.0, 10, 3)
        .with_hall_call(call_secs, 3, Direction::Up)
}

#[test]
fn committed_call_stays_when_a_better_car_frees_up_during_braking() {
    // Car 1 starts braking at 22.0 s, before car 0 closes at 22.8 s.
    let (sim, log) = run_logged(slow_car_race(15.0));
    let messages = log.messages();

    let decelerating = position(&messages, |m| is_status(m, 1, "DECELERATING"))
        .expect("car 1 brakes for the call");
    assert!(same_time(messages[decelerating].time, 22.0));
    // Car 0 parks at the call floor while car 1 is still braking: an ETA of
    // zero against several seconds.
    let parked = position(&messages, |m| is_status(m, 0, "IDLE") && m.time > 20.0)
        .expect("car 0 goes idle at floor 3");
    assert_eq!(messages[parked].data["floor"], 3.0);
    assert!(decelerating < parked);

    let assignments: Vec<_> = messages
        .iter()
        .filter(|m| is_hall(m, BusEventType::HallCallAssignment, 3, "UP"))
        .collect();
    assert_eq!(assignments.len(), 1, "a committed call is never reassigned");
    assert_eq!(car_of(assignments[0]), Some(1));

    let off = position(&messages, |m| is_hall(m, BusEventType::HallCallOff, 3, "UP"))
        .expect("call serviced");
    assert!(parked < off);
    assert_eq!(car_of(&messages[off]), Some(1));

    let serviced: Vec<_> = sim
        .registry()
        .serviced_hall_calls()
        .filter(|call| call.floor == 3 && call.direction == Direction::Up)
        .collect();
    assert_eq!(serviced.len(), 1);
    assert_eq!(serviced[0].serviced_by, Some(1));
    assert!(serviced[0].committed);
}

#[test]
fn uncommitted_call_moves_to_a_car_that_frees_up_before_braking() {
    // Car 1 would start braking at 24.0 s; car 0 starts closing at 22.8 s.
    let (_, log) = run_logged(slow_car_race(17.0));
    let messages = log.messages();

    let assignments: Vec<_> = messages
        .iter()
        .filter(|m| is_hall(m, BusEventType::HallCallAssignment, 3, "UP"))
        .collect();
    assert_eq!(assignments.len(), 2);
    assert_eq!(car_of(assignments[0]), Some(1));
    assert_eq!(car_of(assignments[1]), Some(0));
    assert_eq!(assignments[1].data["previous_car"], 1);
    assert!(same_time(assignments[1].time, 22.8));

    let off = position(&messages, |m| is_hall(m, BusEventType::HallCallOff, 3, "UP"))
        .expect("call serviced");
    assert_eq!(car_of(&messages[off]), Some(0));
}

#[test]
fn full_car_releases_an_opposite_call_at_its_stop() {
    // Car 0 stops at 5 going up and leaves full; the DOWN call at 5 must go
    // to the idle car at the top instead of riding along with car 0.
    let params = ScenarioParams::default()
        .with_floors(20)
        .with_car_configs(vec![
            CarConfig::default().with_capacity(2),
            CarConfig::default().with_start_floor(20),
        ])
        .with_hall_call(0.0, 5, Direction::Down)
        .with_passenger(0.0, 1, 5)
        .with_passenger(0.0, 5, 15)
        .with_passenger(0.0, 5, 15);
    let (sim, log) = run_logged(params);
    let messages = log.messages();

    let braking = position(&messages, |m| is_status(m, 0, "DECELERATING"))
        .expect("car 0 brakes for floor 5");
    let down_calls: Vec<_> = messages
        .iter()
        .filter(|m| is_hall(m, BusEventType::HallCallAssignment, 5, "DOWN"))
        .collect();
    assert_eq!(car_of(down_calls[0]), Some(0));
    let handover = down_calls
        .iter()
        .find(|m| car_of(m) == Some(1))
        .expect("DOWN call handed to car 1");
    assert_eq!(handover.data["previous_car"], 0);
    assert!(handover.time > messages[braking].time);

    let off = position(&messages, |m| is_hall(m, BusEventType::HallCallOff, 5, "DOWN"))
        .expect("DOWN call serviced");
    assert_eq!(car_of(&messages[off]), Some(1));
    assert!(sim
        .registry()
        .serviced_hall_calls()
        .any(|call| call.floor == 5 && call.direction == Direction::Up && call.committed));
    assert_eq!(sim.telemetry().completed_journeys.len(), 3);
}

#[test]
fn full_car_leaves_excess_passengers_with_the_call_registered() {
    let params = one_car_building()
        .with_car_configs(vec![CarConfig::default().with_capacity(2)])
        .with_passenger(0.0, 1, 8)
        .with_passenger(1.0, 5, 7)
        .with_passenger(1.0, 5, 7)
        .with_passenger(1.0, 5, 7);
    let (sim, log) = run_logged(params);
    let messages = log.messages();

    let first_close = position(&messages, |m| is_door(m, 0, 5, "CLOSING_COMPLETE"))
        .expect("car closes at floor 5");
    let first_stop = &messages[..first_close];

    let boardings_at_five = first_stop
        .iter()
        .filter(|m| m.kind == BusEventType::PassengerBoarding && m.data["floor"] == 5)
        .count();
    assert_eq!(boardings_at_five, 1, "only one seat was free");
    assert!(
        !first_stop
            .iter()
            .any(|m| is_hall(m, BusEventType::HallCallOff, 5, "UP")),
        "the hall call must stay registered"
    );
    let waiting_at_five = first_stop
        .iter()
        .filter(|m| m.kind == BusEventType::PassengerWaiting && m.data["floor"] == 5)
        .count();
    assert_eq!(waiting_at_five, 3);

    // The car comes back for the two left behind.
    assert_eq!(sim.telemetry().completed_journeys.len(), 4);
    assert!(sim.registry().pending_hall_calls().next().is_none());
    assert!(sim
        .telemetry()
        .peak_loads
        .iter()
        .all(|(_, load)| *load <= 2));
}
