use std::cmp::Ordering;

use crate::calls::HallCall;
use crate::ecs::CarId;

use super::snapshot::{CarSnapshot, DispatchSnapshot};

/// Outcome of allocating one hall call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    Assign(CarId),
    /// No eligible car right now; the call stays pending and is retried.
    Defer,
}

/// Trait for hall-call allocation strategies.
///
/// Strategies score each eligible car; the lowest score wins. Ties go to the car
/// with the fewest existing assignments, then to the lowest car id.
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cost of serving `call` with `car`. `None` marks the car as ineligible.
    fn score(&self, call: &HallCall, car: &CarSnapshot, snapshot: &DispatchSnapshot)
        -> Option<f64>;

    /// Picks a car for an unassigned call.
    ///
    /// # Default Implementation
    ///
    /// Scores every car that [CarSnapshot::can_accept] the call and returns the best
    /// one by (score, assignment count, car id).
    fn select_car(&self, call: &HallCall, snapshot: &DispatchSnapshot) -> Allocation {
        ranked_candidates(self, call, snapshot)
            .first()
            .map_or(Allocation::Defer, |(car, _)| Allocation::Assign(*car))
    }
}

/// Eligible cars with their scores, best first.
pub fn ranked_candidates<S: AllocationStrategy + ?Sized>(
    strategy: &S,
    call: &HallCall,
    snapshot: &DispatchSnapshot,
) -> Vec<(CarId, f64)> {
    let mut scored: Vec<(CarId, f64, usize)> = snapshot
        .cars
        .iter()
        .filter(|car| car.can_accept(call))
        .filter_map(|car| {
            strategy
                .score(call, car, snapshot)
                .filter(|s| s.is_finite())
                .map(|s| (car.id, s, car.assignment_count()))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then(a.2.cmp(&b.2))
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().map(|(car, score, _)| (car, score)).collect()
}
