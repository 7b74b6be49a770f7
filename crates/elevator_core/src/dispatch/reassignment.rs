use crate::calls::CallId;
use crate::ecs::CarId;
use crate::scenario::ReassignmentPolicy;

use super::allocation::{ranked_candidates, AllocationStrategy};
use super::snapshot::DispatchSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reassignment {
    pub call: CallId,
    pub from: CarId,
    pub to: CarId,
}

/// Moves assigned, uncommitted calls to a strictly better car.
///
/// A call is committed once its car starts decelerating for it; committed calls
/// never move. Otherwise the best-ranked car takes over only if it beats the
/// current car's score by more than `policy.min_improvement`. A current car that
/// can no longer accept the call (e.g. it filled up) always loses it.
pub fn plan_reassignments(
    strategy: &dyn AllocationStrategy,
    snapshot: &DispatchSnapshot,
    policy: &ReassignmentPolicy,
) -> Vec<Reassignment> {
    if !policy.enabled {
        return Vec::new();
    }
    // Scores see the moves already planned in this pass.
    let mut working = snapshot.clone();
    let mut moves = Vec::new();
    for call in snapshot
        .calls
        .hall_calls
        .iter()
        .filter(|c| c.is_pending() && !c.committed)
    {
        let Some(current_id) = call.assigned_car else {
            continue;
        };
        let current_score = working
            .car(current_id)
            .filter(|car| car.can_accept(call))
            .and_then(|car| strategy.score(call, car, &working))
            .unwrap_or(f64::INFINITY);
        let Some((best, best_score)) = ranked_candidates(strategy, call, &working)
            .into_iter()
            .next()
        else {
            continue;
        };
        if best != current_id && best_score + policy.min_improvement < current_score {
            moves.push(Reassignment {
                call: call.id,
                from: current_id,
                to: best,
            });
            working.note_assignment(call, best);
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::earliest_arrival::EarliestArrival;
    use crate::dispatch::nearest_car::NearestCar;
    use crate::dispatch::test_support::{call, car, snapshot};
    use crate::ecs::Direction;

    fn enabled() -> ReassignmentPolicy {
        ReassignmentPolicy {
            enabled: true,
            min_improvement: 1.0,
        }
    }

    #[test]
    fn uncommitted_call_moves_to_a_much_better_car() {
        let mut hc = call(0, 8, Direction::Down);
        hc.assigned_car = Some(0);
        let mut far = car(0, 1);
        far.calls.hall_calls.push((8, Direction::Down));
        let near = car(1, 9);
        let snap = snapshot(vec![far, near], vec![hc]);
        assert_eq!(
            plan_reassignments(&NearestCar, &snap, &enabled()),
            vec![Reassignment {
                call: 0,
                from: 0,
                to: 1
            }]
        );
    }

    #[test]
    fn later_moves_see_earlier_ones_in_the_same_pass() {
        // Car 0 holds two DOWN calls from the lobby; car 1 idles above them.
        let mut upper = call(0, 9, Direction::Down);
        upper.assigned_car = Some(0);
        let mut lower = call(1, 8, Direction::Down);
        lower.assigned_car = Some(0);
        let mut far = car(0, 1);
        far.calls.hall_calls = vec![(9, Direction::Down), (8, Direction::Down)];
        let near = car(1, 10);
        let snap = snapshot(vec![far, near], vec![upper, lower]);

        // Once car 1 takes floor 9 it must stop there first, so floor 8 is no
        // longer worth moving.
        assert_eq!(
            plan_reassignments(&EarliestArrival::default(), &snap, &enabled()),
            vec![Reassignment {
                call: 0,
                from: 0,
                to: 1
            }]
        );
    }

    #[test]
    fn committed_call_never_moves() {
        let mut hc = call(0, 8, Direction::Down);
        hc.assigned_car = Some(0);
        hc.committed = true;
        let far = car(0, 1);
        let near = car(1, 9);
        let snap = snapshot(vec![far, near], vec![hc]);
        assert!(plan_reassignments(&NearestCar, &snap, &enabled()).is_empty());
    }

    #[test]
    fn marginal_gain_is_not_enough() {
        let mut hc = call(0, 5, Direction::Up);
        hc.assigned_car = Some(0);
        let current = car(0, 3);
        let slightly_nearer = car(1, 6);
        let snap = snapshot(vec![current, slightly_nearer], vec![hc]);
        assert!(plan_reassignments(&NearestCar, &snap, &enabled()).is_empty());
    }

    #[test]
    fn disabled_policy_keeps_everything() {
        let mut hc = call(0, 8, Direction::Down);
        hc.assigned_car = Some(0);
        let snap = snapshot(vec![car(0, 1), car(1, 9)], vec![hc]);
        assert!(plan_reassignments(&NearestCar, &snap, &ReassignmentPolicy::default()).is_empty());
    }
}
