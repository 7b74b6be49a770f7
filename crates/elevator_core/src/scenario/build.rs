use std::collections::BTreeSet;

use bevy_ecs::prelude::{Resource, World};
use tracing::info;

use crate::bus::EventBus;
use crate::calls::CallRegistry;
use crate::clock::{secs_to_ms, SimulationClock};
use crate::dispatch::{
    build_allocation, build_repositioning, AllocationResource, DemandHistory, DispatchState,
    RepositioningResource,
};
use crate::ecs::{Car, CarId, CarRoster, Direction, Door, FloorQueues, MotionPhase, NextPassengerId};
use crate::error::{ConfigError, SimFaults};
use crate::profiling::EventMetrics;
use crate::scenario::params::{
    CarConfig, PassengerTiming, ScenarioParams, ScriptedHallCall, ScriptedPassenger,
    SimulationEndTimeMs,
};
use crate::spawner::PassengerSpawner;
use crate::telemetry::SimTelemetry;

/// Scripted passengers, consumed by the `SimulationStarted` system.
#[derive(Debug, Default, Resource)]
pub struct PendingPassengers(pub Vec<ScriptedPassenger>);

/// Scripted hall-button presses, consumed by the `SimulationStarted` system.
#[derive(Debug, Default, Resource)]
pub struct PendingHallCalls(pub Vec<ScriptedHallCall>);

fn spawn_car(world: &mut World, id: CarId, config: &CarConfig, num_floors: u32) {
    let service_floors: BTreeSet<u32> = match &config.service_floors {
        Some(floors) => floors.iter().copied().collect(),
        None => (1..=num_floors).collect(),
    };
    let entity = world
        .spawn((
            Car {
                id,
                floor: config.start(),
                direction: Direction::None,
                phase: MotionPhase::Idle,
                serving: Direction::None,
                capacity: config.capacity,
                onboard: Vec::new(),
                limits: config.limits(),
                full_load_bypass: config.full_load_bypass,
                home_floor: config.home_floor,
                main_direction: config.main_direction,
                service_floors,
                trip: None,
                idle_since: Some(0),
            },
            Door::default(),
        ))
        .id();
    world.resource_mut::<CarRoster>().insert(id, entity);
}

/// Validates `params` and populates `world` with every resource and car entity
/// the simulation schedule needs. Call [crate::runner::initialize_simulation]
/// afterwards to queue the start event.
pub fn build_scenario(world: &mut World, params: ScenarioParams) -> Result<(), ConfigError> {
    params.validate()?;
    let building = params.building;
    let car_ids = 0..params.cars.len() as CarId;

    world.insert_resource(SimulationClock::default());
    world.insert_resource(building);
    world.insert_resource(params.door);
    world.insert_resource(CallRegistry::new(
        building.num_floors,
        params.dispatch.call_mode,
        car_ids.clone(),
    ));
    world.insert_resource(AllocationResource::new(build_allocation(
        params.dispatch.allocation,
        params.dispatch.stop_time_secs,
    )));
    world.insert_resource(RepositioningResource::new(build_repositioning(
        params.dispatch.repositioning,
    )));
    world.insert_resource(params.dispatch.clone());
    world.insert_resource(DispatchState::default());
    world.insert_resource(DemandHistory::default());
    world.insert_resource(FloorQueues::default());
    world.insert_resource(NextPassengerId::default());
    world.insert_resource(EventBus::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(EventMetrics::default());
    world.insert_resource(SimFaults::default());
    world.insert_resource(CarRoster::default());

    let timing = match &params.traffic {
        Some(traffic) => {
            let spawner = PassengerSpawner::new(
                traffic.clone(),
                building.num_floors,
                params.seed,
            );
            let timing = spawner.timing();
            world.insert_resource(spawner);
            timing
        }
        None => PassengerTiming::default(),
    };
    world.insert_resource(timing);

    let mut passengers = params.passengers.clone();
    // Stable: equal arrival times keep their listed order.
    passengers.sort_by(|a, b| a.arrival_secs.total_cmp(&b.arrival_secs));
    world.insert_resource(PendingPassengers(passengers));
    let mut hall_calls = params.hall_calls.clone();
    hall_calls.sort_by(|a, b| a.at_secs.total_cmp(&b.at_secs));
    world.insert_resource(PendingHallCalls(hall_calls));

    if let Some(end) = params.end_time_secs {
        world.insert_resource(SimulationEndTimeMs(secs_to_ms(end)));
    }

    for (id, config) in car_ids.zip(&params.cars) {
        spawn_car(world, id, config, building.num_floors);
    }

    info!(
        floors = building.num_floors,
        cars = params.cars.len(),
        scripted_passengers = params.passengers.len(),
        traffic = params.traffic.is_some(),
        allocation = ?params.dispatch.allocation,
        "scenario built"
    );
    Ok(())
}
