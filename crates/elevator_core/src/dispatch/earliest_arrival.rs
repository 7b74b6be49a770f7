use crate::calls::HallCall;

use super::allocation::AllocationStrategy;
use super::prediction::ArrivalPredictor;
use super::snapshot::{CarSnapshot, DispatchSnapshot};

/// Assigns each call to the car predicted to reach it first.
#[derive(Debug, Default, Clone, Copy)]
pub struct EarliestArrival {
    predictor: ArrivalPredictor,
}

impl EarliestArrival {
    pub fn new(predictor: ArrivalPredictor) -> Self {
        Self { predictor }
    }
}

impl AllocationStrategy for EarliestArrival {
    fn name(&self) -> &'static str {
        "earliest_arrival"
    }

    fn score(&self, call: &HallCall, car: &CarSnapshot, snapshot: &DispatchSnapshot) -> Option<f64> {
        self.predictor
            .predict(car, call.floor, call.direction, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::allocation::Allocation;
    use crate::dispatch::test_support::{call, car, snapshot};
    use crate::ecs::Direction;

    #[test]
    fn busy_nearby_car_loses_to_free_distant_car() {
        let call = call(0, 4, Direction::Up);
        let mut busy = car(0, 3);
        busy.direction = Direction::Down;
        busy.calls.car_calls.push(1);
        let free = car(1, 7);
        let snap = snapshot(vec![busy, free], vec![call.clone()]);
        assert_eq!(
            EarliestArrival::default().select_car(&call, &snap),
            Allocation::Assign(1)
        );
    }
}
