use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::calls::CallMode;
use crate::ecs::Direction;
use crate::error::ConfigError;
use crate::kinematics::MotionLimits;

/// Simulation end time in milliseconds. Events after this timestamp are left
/// unprocessed.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationEndTimeMs(pub u64);

/// Building geometry. Floors are numbered `1..=num_floors`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct BuildingConfig {
    pub num_floors: u32,
    /// Metres between consecutive floors.
    pub floor_height: f64,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            num_floors: 10,
            floor_height: 3.5,
        }
    }
}

impl BuildingConfig {
    pub fn contains(&self, floor: u32) -> bool {
        (1..=self.num_floors).contains(&floor)
    }

    pub fn floors_to_metres(&self, floors: f64) -> f64 {
        floors * self.floor_height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    pub capacity: u32,
    /// Rated speed, m/s.
    pub rated_speed: f64,
    /// m/s².
    pub acceleration: f64,
    /// m/s³.
    pub jerk: f64,
    pub full_load_bypass: bool,
    pub home_floor: u32,
    /// Direction a returning car is parked to serve, usually UP at the lobby.
    pub main_direction: Direction,
    /// Floor at simulation start; defaults to `home_floor`.
    pub start_floor: Option<u32>,
    /// Floors this car may stop at; all floors when unset.
    pub service_floors: Option<Vec<u32>>,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            rated_speed: 2.5,
            acceleration: 1.0,
            jerk: 2.0,
            full_load_bypass: true,
            home_floor: 1,
            main_direction: Direction::Up,
            start_floor: None,
            service_floors: None,
        }
    }
}

impl CarConfig {
    pub fn limits(&self) -> MotionLimits {
        MotionLimits::new(self.rated_speed, self.acceleration, self.jerk)
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_start_floor(mut self, floor: u32) -> Self {
        self.start_floor = Some(floor);
        self
    }

    pub fn with_home_floor(mut self, floor: u32) -> Self {
        self.home_floor = floor;
        self
    }

    pub fn with_service_floors(mut self, floors: Vec<u32>) -> Self {
        self.service_floors = Some(floors);
        self
    }

    pub fn with_full_load_bypass(mut self, enabled: bool) -> Self {
        self.full_load_bypass = enabled;
        self
    }

    pub fn start(&self) -> u32 {
        self.start_floor.unwrap_or(self.home_floor)
    }
}

/// Door timing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct DoorConfig {
    pub open_secs: f64,
    pub close_secs: f64,
    /// How long an open door waits with nobody moving before it starts closing.
    pub dwell_secs: f64,
    /// Time to reopen from a closing door.
    pub reopen_delay_secs: f64,
    /// Reopens allowed per stop before obstructions are ignored.
    pub max_reopens: u32,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            open_secs: 2.0,
            close_secs: 2.0,
            dwell_secs: 1.0,
            reopen_delay_secs: 0.5,
            max_reopens: 3,
        }
    }
}

/// Per-passenger transfer times applied to every passenger in the run.
#[derive(Debug, Clone, Copy, PartialEq, Resource)]
pub struct PassengerTiming {
    pub boarding_secs: f64,
    pub alighting_secs: f64,
}

impl Default for PassengerTiming {
    fn default() -> Self {
        Self {
            boarding_secs: 1.0,
            alighting_secs: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPatternKind {
    #[default]
    Uniform,
    /// Most passengers start at the lobby.
    UpPeak,
    /// Most passengers head to the lobby.
    DownPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterArrivalKind {
    #[default]
    Exponential,
    Uniform,
}

/// Generated passenger traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub pattern: TrafficPatternKind,
    pub inter_arrival: InterArrivalKind,
    /// Passengers are generated while simulation time is below this.
    pub duration_secs: f64,
    /// Passengers per second.
    pub arrival_rate: f64,
    pub avg_boarding_secs: f64,
    pub avg_alighting_secs: f64,
    pub lobby_floor: u32,
    /// Share of passengers following the peak pattern; the rest are uniform.
    pub peak_share: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            pattern: TrafficPatternKind::Uniform,
            inter_arrival: InterArrivalKind::Exponential,
            duration_secs: 300.0,
            arrival_rate: 0.1,
            avg_boarding_secs: 1.0,
            avg_alighting_secs: 0.8,
            lobby_floor: 1,
            peak_share: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKind {
    #[default]
    NearestCar,
    EarliestArrival,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositioningKind {
    #[default]
    None,
    /// Forced move back to the home floor after the car has idled this long.
    LobbyReturn { idle_delay_secs: f64 },
    /// Move command to the busiest recent call floor not already covered by an idle car.
    DemandParking {
        idle_delay_secs: f64,
        window_secs: f64,
    },
}

/// Optional reassignment of assigned-but-uncommitted calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassignmentPolicy {
    pub enabled: bool,
    /// A new car must beat the current one by more than this score margin.
    pub min_improvement: f64,
}

impl Default for ReassignmentPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_improvement: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct DispatchConfig {
    pub allocation: AllocationKind,
    pub repositioning: RepositioningKind,
    pub reassignment: ReassignmentPolicy,
    pub call_mode: CallMode,
    /// Expected time per intermediate stop in arrival predictions.
    pub stop_time_secs: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationKind::NearestCar,
            repositioning: RepositioningKind::None,
            reassignment: ReassignmentPolicy::default(),
            call_mode: CallMode::Traditional,
            stop_time_secs: 5.0,
        }
    }
}

/// Passenger with a fixed arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPassenger {
    pub arrival_secs: f64,
    pub origin: u32,
    pub destination: u32,
}

/// Hall button press without a passenger behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedHallCall {
    pub at_secs: f64,
    pub floor: u32,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    pub seed: u64,
    pub building: BuildingConfig,
    pub cars: Vec<CarConfig>,
    pub door: DoorConfig,
    /// Random traffic; `None` runs scripted passengers and hall calls only.
    pub traffic: Option<TrafficConfig>,
    pub dispatch: DispatchConfig,
    pub end_time_secs: Option<f64>,
    pub passengers: Vec<ScriptedPassenger>,
    pub hall_calls: Vec<ScriptedHallCall>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 42,
            building: BuildingConfig::default(),
            cars: vec![CarConfig::default()],
            door: DoorConfig::default(),
            traffic: None,
            dispatch: DispatchConfig::default(),
            end_time_secs: None,
            passengers: Vec::new(),
            hall_calls: Vec::new(),
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_floors(mut self, num_floors: u32) -> Self {
        self.building.num_floors = num_floors;
        self
    }

    pub fn with_floor_height(mut self, floor_height: f64) -> Self {
        self.building.floor_height = floor_height;
        self
    }

    /// `count` identical cars with default settings.
    pub fn with_cars(mut self, count: usize) -> Self {
        self.cars = vec![CarConfig::default(); count];
        self
    }

    pub fn with_car_configs(mut self, cars: Vec<CarConfig>) -> Self {
        self.cars = cars;
        self
    }

    pub fn with_door(mut self, door: DoorConfig) -> Self {
        self.door = door;
        self
    }

    pub fn with_traffic(mut self, traffic: TrafficConfig) -> Self {
        self.traffic = Some(traffic);
        self
    }

    pub fn with_allocation(mut self, allocation: AllocationKind) -> Self {
        self.dispatch.allocation = allocation;
        self
    }

    pub fn with_repositioning(mut self, repositioning: RepositioningKind) -> Self {
        self.dispatch.repositioning = repositioning;
        self
    }

    pub fn with_reassignment(mut self, policy: ReassignmentPolicy) -> Self {
        self.dispatch.reassignment = policy;
        self
    }

    pub fn with_call_mode(mut self, mode: CallMode) -> Self {
        self.dispatch.call_mode = mode;
        self
    }

    pub fn with_end_time_secs(mut self, secs: f64) -> Self {
        self.end_time_secs = Some(secs);
        self
    }

    pub fn with_passenger(mut self, arrival_secs: f64, origin: u32, destination: u32) -> Self {
        self.passengers.push(ScriptedPassenger {
            arrival_secs,
            origin,
            destination,
        });
        self
    }

    pub fn with_hall_call(mut self, at_secs: f64, floor: u32, direction: Direction) -> Self {
        self.hall_calls.push(ScriptedHallCall {
            at_secs,
            floor,
            direction,
        });
        self
    }

    /// Rejects configurations the simulation cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let building = &self.building;
        if building.num_floors < 2 {
            return Err(ConfigError::TooFewFloors(building.num_floors));
        }
        if !(building.floor_height.is_finite() && building.floor_height > 0.0) {
            return Err(ConfigError::NonPositiveFloorHeight(building.floor_height));
        }
        if self.cars.is_empty() {
            return Err(ConfigError::NoCars);
        }
        for (index, car) in self.cars.iter().enumerate() {
            validate_car(index, car, building)?;
        }
        validate_door(&self.door)?;
        if let Some(traffic) = &self.traffic {
            validate_traffic(traffic, building)?;
        }
        validate_dispatch(&self.dispatch)?;

        for (index, p) in self.passengers.iter().enumerate() {
            let reason = if !non_negative(p.arrival_secs) {
                Some("arrival time must be non-negative".to_string())
            } else if !building.contains(p.origin) || !building.contains(p.destination) {
                Some(format!("floors {} -> {} out of range", p.origin, p.destination))
            } else if p.origin == p.destination {
                Some("origin equals destination".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::InvalidScriptedPassenger { index, reason });
            }
        }

        for (index, call) in self.hall_calls.iter().enumerate() {
            let possible = match call.direction {
                Direction::Up => call.floor < building.num_floors,
                Direction::Down => call.floor > 1,
                Direction::None => false,
            };
            let reason = if !non_negative(call.at_secs) {
                Some("press time must be non-negative".to_string())
            } else if !building.contains(call.floor) {
                Some(format!("floor {} out of range", call.floor))
            } else if !possible {
                Some(format!("no {:?} call possible at floor {}", call.direction, call.floor))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::InvalidScriptedHallCall { index, reason });
            }
        }

        if let Some(end) = self.end_time_secs {
            if !non_negative(end) {
                return Err(ConfigError::InvalidDispatch(format!(
                    "end time must be non-negative, got {end}"
                )));
            }
        }
        Ok(())
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn validate_car(index: usize, car: &CarConfig, building: &BuildingConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("rated_speed", car.rated_speed),
        ("acceleration", car.acceleration),
        ("jerk", car.jerk),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::NonPositiveLimit {
                car: index,
                field,
                value,
            });
        }
    }
    if car.capacity == 0 {
        return Err(ConfigError::ZeroCapacity { car: index });
    }
    if car.main_direction == Direction::None {
        return Err(ConfigError::InvalidMainDirection { car: index });
    }
    let mut floors = vec![car.home_floor, car.start()];
    if let Some(service) = &car.service_floors {
        floors.extend(service.iter().copied());
    }
    if let Some(floor) = floors.into_iter().find(|f| !building.contains(*f)) {
        return Err(ConfigError::CarFloorOutOfRange {
            car: index,
            floor,
            num_floors: building.num_floors,
        });
    }
    if let Some(service) = &car.service_floors {
        if !service.contains(&car.home_floor) {
            return Err(ConfigError::HomeFloorNotServed {
                car: index,
                home_floor: car.home_floor,
            });
        }
    }
    Ok(())
}

fn validate_door(door: &DoorConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("open_secs", door.open_secs),
        ("close_secs", door.close_secs),
        ("dwell_secs", door.dwell_secs),
        ("reopen_delay_secs", door.reopen_delay_secs),
    ] {
        if !non_negative(value) {
            return Err(ConfigError::InvalidDoorTiming { field, value });
        }
    }
    Ok(())
}

fn validate_traffic(traffic: &TrafficConfig, building: &BuildingConfig) -> Result<(), ConfigError> {
    if !non_negative(traffic.duration_secs) {
        return Err(ConfigError::InvalidTraffic(format!(
            "duration must be non-negative, got {}",
            traffic.duration_secs
        )));
    }
    if !non_negative(traffic.arrival_rate) {
        return Err(ConfigError::InvalidTraffic(format!(
            "arrival rate must be non-negative, got {}",
            traffic.arrival_rate
        )));
    }
    if !non_negative(traffic.avg_boarding_secs) || !non_negative(traffic.avg_alighting_secs) {
        return Err(ConfigError::InvalidTraffic(
            "boarding and alighting times must be non-negative".to_string(),
        ));
    }
    if !building.contains(traffic.lobby_floor) {
        return Err(ConfigError::InvalidTraffic(format!(
            "lobby floor {} out of range",
            traffic.lobby_floor
        )));
    }
    if !(0.0..=1.0).contains(&traffic.peak_share) {
        return Err(ConfigError::InvalidTraffic(format!(
            "peak share must be within [0, 1], got {}",
            traffic.peak_share
        )));
    }
    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if !non_negative(dispatch.stop_time_secs) {
        return Err(ConfigError::InvalidDispatch(format!(
            "stop time must be non-negative, got {}",
            dispatch.stop_time_secs
        )));
    }
    if !non_negative(dispatch.reassignment.min_improvement) {
        return Err(ConfigError::InvalidDispatch(
            "reassignment margin must be non-negative".to_string(),
        ));
    }
    let delays = match dispatch.repositioning {
        RepositioningKind::None => vec![],
        RepositioningKind::LobbyReturn { idle_delay_secs } => vec![idle_delay_secs],
        RepositioningKind::DemandParking {
            idle_delay_secs,
            window_secs,
        } => vec![idle_delay_secs, window_secs],
    };
    if delays.into_iter().any(|d| !non_negative(d)) {
        return Err(ConfigError::InvalidDispatch(
            "repositioning delays must be non-negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ScenarioParams::default().validate(), Ok(()));
        assert_eq!(
            ScenarioParams::default()
                .with_traffic(TrafficConfig::default())
                .with_cars(3)
                .validate(),
            Ok(())
        );
    }

    #[test]
    fn rejects_too_few_floors() {
        let params = ScenarioParams::default().with_floors(1);
        assert_eq!(params.validate(), Err(ConfigError::TooFewFloors(1)));
    }

    #[test]
    fn rejects_non_positive_speed() {
        let car = CarConfig {
            rated_speed: 0.0,
            ..CarConfig::default()
        };
        let params = ScenarioParams::default().with_car_configs(vec![car]);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonPositiveLimit {
                field: "rated_speed",
                ..
            })
        ));
    }

    #[test]
    fn rejects_out_of_range_scripted_passenger() {
        let params = ScenarioParams::default().with_passenger(0.0, 1, 12);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidScriptedPassenger { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_impossible_scripted_hall_call() {
        let params = ScenarioParams::default().with_hall_call(0.0, 10, Direction::Up);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidScriptedHallCall { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_service_floors_without_home() {
        let car = CarConfig::default().with_service_floors(vec![5, 6, 7]);
        let params = ScenarioParams::default().with_car_configs(vec![car]);
        assert_eq!(
            params.validate(),
            Err(ConfigError::HomeFloorNotServed {
                car: 0,
                home_floor: 1
            })
        );
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let params: ScenarioParams = serde_json::from_str(
            r#"{"building": {"num_floors": 20}, "dispatch": {"repositioning": {"kind": "lobby_return", "idle_delay_secs": 10.0}}}"#,
        )
        .expect("parse");
        assert_eq!(params.building.num_floors, 20);
        assert_eq!(params.building.floor_height, 3.5);
        assert_eq!(
            params.dispatch.repositioning,
            RepositioningKind::LobbyReturn {
                idle_delay_secs: 10.0
            }
        );
        assert_eq!(params.cars.len(), 1);
    }
}
