//! Owned simulation context: one [World] plus its schedule.

use bevy_ecs::prelude::{Entity, Schedule, World};

use crate::bus::{EventBus, EventLog, EventSubscriber};
use crate::calls::CallRegistry;
use crate::clock::{secs_to_ms, EventKind, EventSubject, SimulationClock};
use crate::ecs::{Car, CarId, CarRoster};
use crate::error::{ConfigError, SimError};
use crate::profiling::EventMetrics;
use crate::runner::{initialize_simulation, run_next_event, run_until, run_until_empty, simulation_schedule};
use crate::scenario::{build_scenario, ScenarioParams};
use crate::telemetry::SimTelemetry;

pub struct ElevatorSimulation {
    world: World,
    schedule: Schedule,
}

impl ElevatorSimulation {
    /// Validates `params` and sets up a run that starts at time 0.
    pub fn new(params: ScenarioParams) -> Result<Self, ConfigError> {
        let mut world = World::new();
        build_scenario(&mut world, params)?;
        initialize_simulation(&mut world);
        Ok(Self {
            world,
            schedule: simulation_schedule(),
        })
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.world.resource_mut::<EventBus>().subscribe(subscriber);
    }

    /// Subscribes a fresh [EventLog] and returns a handle sharing its buffer.
    pub fn event_log(&mut self) -> EventLog {
        let log = EventLog::new();
        self.subscribe(Box::new(log.clone()));
        log
    }

    /// Processes one event. `Ok(false)` once nothing is left to run.
    pub fn step(&mut self) -> Result<bool, SimError> {
        run_next_event(&mut self.world, &mut self.schedule)
    }

    /// Processes every event at or before `secs`.
    pub fn run_until_secs(&mut self, secs: f64) -> Result<usize, SimError> {
        run_until(&mut self.world, &mut self.schedule, secs_to_ms(secs))
    }

    pub fn run_to_completion(&mut self, max_steps: usize) -> Result<usize, SimError> {
        run_until_empty(&mut self.world, &mut self.schedule, max_steps)
    }

    pub fn now_secs(&self) -> f64 {
        self.world.resource::<SimulationClock>().now_secs()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn registry(&self) -> &CallRegistry {
        self.world.resource::<CallRegistry>()
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        self.world.resource::<SimTelemetry>()
    }

    pub fn metrics(&self) -> &EventMetrics {
        self.world.resource::<EventMetrics>()
    }

    pub fn car_entity(&self, id: CarId) -> Option<Entity> {
        self.world.resource::<CarRoster>().entity(id)
    }

    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.car_entity(id)
            .and_then(|entity| self.world.get::<Car>(entity))
    }

    /// Cars ordered by id.
    pub fn cars(&self) -> Vec<&Car> {
        let roster = self.world.resource::<CarRoster>();
        roster
            .ids()
            .filter_map(|id| roster.entity(id))
            .filter_map(|entity| self.world.get::<Car>(entity))
            .collect()
    }

    /// Schedules an obstruction in `car`'s doorway at `at_secs` (not before now).
    pub fn schedule_obstruction(&mut self, car: CarId, at_secs: f64) -> bool {
        let Some(entity) = self.car_entity(car) else {
            return false;
        };
        let mut clock = self.world.resource_mut::<SimulationClock>();
        let at = secs_to_ms(at_secs).max(clock.now());
        clock.schedule_at(at, EventKind::DoorObstruction, Some(EventSubject::Car(entity)));
        true
    }
}
