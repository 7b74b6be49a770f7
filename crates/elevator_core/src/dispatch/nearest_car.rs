use crate::calls::HallCall;
use crate::ecs::Direction;

use super::allocation::AllocationStrategy;
use super::snapshot::{CarSnapshot, DispatchSnapshot};

/// Nearest-car allocation on a circular floor metric.
///
/// A car travelling toward the call in the call's direction is scored by the
/// plain distance. Any other moving car must run to the end of its sweep first,
/// so it is scored by the distance via the top (UP cars) or bottom (DOWN cars)
/// floor. Distances are taken from the car's advanced floor; a call at that
/// floor counts as behind a moving car.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestCar;

pub fn circular_distance(car_floor: u32, direction: Direction, call: &HallCall, num_floors: u32) -> f64 {
    let v = car_floor as f64;
    let c = call.floor as f64;
    let n = num_floors as f64;
    match direction {
        Direction::None => (c - v).abs(),
        Direction::Up if call.direction == Direction::Up && call.floor > car_floor => c - v,
        Direction::Up => (n - v) + (n - c),
        Direction::Down if call.direction == Direction::Down && call.floor < car_floor => v - c,
        Direction::Down => (v - 1.0) + (c - 1.0),
    }
}

impl AllocationStrategy for NearestCar {
    fn name(&self) -> &'static str {
        "nearest_car"
    }

    fn score(&self, call: &HallCall, car: &CarSnapshot, snapshot: &DispatchSnapshot) -> Option<f64> {
        Some(circular_distance(
            car.advanced_floor,
            car.direction,
            call,
            snapshot.num_floors,
        ))
    }
}
