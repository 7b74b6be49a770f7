//! Telemetry / KPIs: completed journeys and serviced hall calls.

use bevy_ecs::prelude::Resource;

use crate::calls::CallId;
use crate::clock::ms_to_secs;
use crate::ecs::{CarId, Direction, PassengerId};

/// One passenger journey, recorded when the passenger alights.
/// Timestamps are simulation ms; use the helper methods for derived KPIs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJourney {
    pub passenger: PassengerId,
    pub car: CarId,
    pub origin: u32,
    pub destination: u32,
    pub call_time: u64,
    pub boarding_time: u64,
    pub alighting_time: u64,
}

impl CompletedJourney {
    /// Time from call to boarding.
    pub fn wait_ms(&self) -> u64 {
        self.boarding_time.saturating_sub(self.call_time)
    }

    pub fn ride_ms(&self) -> u64 {
        self.alighting_time.saturating_sub(self.boarding_time)
    }

    pub fn journey_ms(&self) -> u64 {
        self.alighting_time.saturating_sub(self.call_time)
    }
}

/// A hall call as it was cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicedHallCallRecord {
    pub call: CallId,
    pub floor: u32,
    pub direction: Direction,
    pub car: CarId,
    /// Floor the car stood at when it cleared the call.
    pub car_floor: u32,
    /// Direction the car was serving at that stop.
    pub served_direction: Direction,
    pub registered_at: u64,
    pub serviced_at: u64,
}

impl ServicedHallCallRecord {
    pub fn response_ms(&self) -> u64 {
        self.serviced_at.saturating_sub(self.registered_at)
    }
}

/// Collects simulation telemetry.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub completed_journeys: Vec<CompletedJourney>,
    pub serviced_hall_calls: Vec<ServicedHallCallRecord>,
    /// Highest load observed per car, by car id.
    pub peak_loads: Vec<(CarId, u32)>,
}

impl SimTelemetry {
    pub fn record_load(&mut self, car: CarId, load: u32) {
        match self.peak_loads.iter_mut().find(|(id, _)| *id == car) {
            Some((_, peak)) => *peak = (*peak).max(load),
            None => self.peak_loads.push((car, load)),
        }
    }

    pub fn average_wait_secs(&self) -> Option<f64> {
        average(self.completed_journeys.iter().map(CompletedJourney::wait_ms))
    }

    pub fn average_journey_secs(&self) -> Option<f64> {
        average(self.completed_journeys.iter().map(CompletedJourney::journey_ms))
    }

    pub fn average_response_secs(&self) -> Option<f64> {
        average(
            self.serviced_hall_calls
                .iter()
                .map(ServicedHallCallRecord::response_ms),
        )
    }
}

fn average(values: impl Iterator<Item = u64>) -> Option<f64> {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| ms_to_secs(sum) / count as f64)
}
