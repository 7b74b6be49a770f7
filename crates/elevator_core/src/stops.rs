//! Selective-collective stop planning.
//!
//! A car keeps its direction while it has stops ahead: the nearest car call, same
//! direction hall call, or forced call. With none of those ahead it runs to the
//! farthest opposite-direction hall call and turns around there. A full car with
//! full-load bypass ignores hall calls entirely.
//!
//! Shared by the car state machine and the arrival predictor so both plan the
//! same stop sequence.

use crate::calls::CarCallView;
use crate::ecs::Direction;

/// Stop-planning inputs for one car.
#[derive(Debug, Clone, Copy)]
pub struct StopPlanner<'a> {
    view: &'a CarCallView,
    bypass_hall_calls: bool,
}

impl<'a> StopPlanner<'a> {
    pub fn new(view: &'a CarCallView, is_full: bool, full_load_bypass: bool) -> Self {
        Self {
            view,
            bypass_hall_calls: is_full && full_load_bypass,
        }
    }

    fn hall_floors(&self, direction: Direction) -> impl Iterator<Item = u32> + '_ {
        let bypass = self.bypass_hall_calls;
        self.view
            .hall_calls
            .iter()
            .filter(move |(_, d)| !bypass && *d == direction)
            .map(|(floor, _)| *floor)
    }

    fn forced_floors(&self, direction: Direction) -> impl Iterator<Item = u32> + '_ {
        self.view
            .forced
            .iter()
            .filter(move |(_, d)| *d == direction || *d == Direction::None)
            .map(|(floor, _)| *floor)
    }

    /// Next floor to stop at when travelling `direction` from continuous position `from`.
    pub fn next_stop(&self, from: f64, direction: Direction) -> Option<u32> {
        let ahead = |floor: &u32| match direction {
            Direction::Up => *floor as f64 > from,
            Direction::Down => (*floor as f64) < from,
            Direction::None => false,
        };

        let collective = self
            .view
            .car_calls
            .iter()
            .copied()
            .chain(self.hall_floors(direction))
            .chain(self.forced_floors(direction))
            .filter(|f| ahead(f));
        let nearest = match direction {
            Direction::Up => collective.min(),
            Direction::Down => collective.max(),
            Direction::None => None,
        };
        if nearest.is_some() {
            return nearest;
        }

        let opposite = direction.opposite();
        let turnaround = self
            .hall_floors(opposite)
            .chain(
                self.view
                    .forced
                    .iter()
                    .filter(|(_, d)| *d == opposite)
                    .map(|(floor, _)| *floor),
            )
            .filter(|f| ahead(f));
        match direction {
            Direction::Up => turnaround.max(),
            Direction::Down => turnaround.min(),
            Direction::None => None,
        }
    }

    /// Whether a hall or forced call in `direction` is waiting at `floor`.
    pub fn call_at(&self, floor: u32, direction: Direction) -> bool {
        self.hall_floors(direction).any(|f| f == floor)
            || self
                .view
                .forced
                .is_some_and(|(f, d)| f == floor && (d == direction || d == Direction::None))
    }

    /// Direction to serve at `floor`, where a car is stopped or idle.
    pub fn decide_direction(&self, floor: u32, current: Direction) -> Direction {
        let from = floor as f64;
        if current != Direction::None {
            if self.call_at(floor, current) || self.next_stop(from, current).is_some() {
                return current;
            }
            let opposite = current.opposite();
            if self.call_at(floor, opposite) || self.next_stop(from, opposite).is_some() {
                return opposite;
            }
            return Direction::None;
        }

        if self.call_at(floor, Direction::Up) {
            return Direction::Up;
        }
        if self.call_at(floor, Direction::Down) {
            return Direction::Down;
        }
        self.nearest_target_direction(floor)
    }

    fn nearest_target_direction(&self, floor: u32) -> Direction {
        let targets = self
            .view
            .car_calls
            .iter()
            .copied()
            .chain(self.hall_floors(Direction::Up))
            .chain(self.hall_floors(Direction::Down))
            .chain(self.view.forced.iter().map(|(f, _)| *f))
            .filter(|f| *f != floor);
        targets
            .min_by_key(|f| (f.abs_diff(floor), *f < floor))
            .map_or(Direction::None, |f| {
                Direction::between(floor as f64, f as f64)
            })
    }

    /// Hall calls in `direction` strictly between `from` and `to` that a full car skips.
    pub fn bypassed_between(&self, from: u32, to: u32, direction: Direction) -> Vec<u32> {
        if !self.bypass_hall_calls {
            return Vec::new();
        }
        let (lo, hi) = (from.min(to), from.max(to));
        let mut floors: Vec<u32> = self
            .view
            .hall_calls
            .iter()
            .filter(|(f, d)| *d == direction && *f > lo && *f < hi)
            .map(|(f, _)| *f)
            .collect();
        floors.sort_unstable();
        floors.dedup();
        floors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(car_calls: &[u32], hall_calls: &[(u32, Direction)]) -> CarCallView {
        CarCallView {
            car_calls: car_calls.to_vec(),
            hall_calls: hall_calls.to_vec(),
            forced: None,
            move_target: None,
        }
    }

    #[test]
    fn picks_nearest_collective_stop_ahead() {
        let v = view(&[9], &[(6, Direction::Up), (4, Direction::Down)]);
        let planner = StopPlanner::new(&v, false, true);
        assert_eq!(planner.next_stop(2.0, Direction::Up), Some(6));
        assert_eq!(planner.next_stop(6.0, Direction::Up), Some(9));
        assert_eq!(planner.next_stop(9.0, Direction::Down), Some(4));
    }

    #[test]
    fn turns_around_at_farthest_opposite_call() {
        let v = view(&[], &[(5, Direction::Down), (8, Direction::Down)]);
        let planner = StopPlanner::new(&v, false, true);
        assert_eq!(planner.next_stop(1.0, Direction::Up), Some(8));
        assert_eq!(planner.next_stop(8.0, Direction::Down), Some(5));
    }

    #[test]
    fn full_car_bypasses_hall_calls() {
        let v = view(&[10], &[(6, Direction::Up)]);
        let planner = StopPlanner::new(&v, true, true);
        assert_eq!(planner.next_stop(2.0, Direction::Up), Some(10));
        assert_eq!(planner.bypassed_between(2, 10, Direction::Up), vec![6]);

        let no_bypass = StopPlanner::new(&v, true, false);
        assert_eq!(no_bypass.next_stop(2.0, Direction::Up), Some(6));
        assert!(no_bypass.bypassed_between(2, 10, Direction::Up).is_empty());
    }

    #[test]
    fn reverses_only_when_nothing_remains_ahead() {
        let v = view(&[2], &[(5, Direction::Down)]);
        let planner = StopPlanner::new(&v, false, true);
        assert_eq!(planner.decide_direction(5, Direction::Up), Direction::Down);
        assert_eq!(planner.decide_direction(3, Direction::Down), Direction::Down);

        let empty = view(&[], &[]);
        let idle = StopPlanner::new(&empty, false, true);
        assert_eq!(idle.decide_direction(3, Direction::Up), Direction::None);
    }

    #[test]
    fn idle_car_heads_for_nearest_call() {
        let v = view(&[], &[(9, Direction::Down), (2, Direction::Up)]);
        let planner = StopPlanner::new(&v, false, true);
        assert_eq!(planner.decide_direction(4, Direction::None), Direction::Down);
        let at_floor = view(&[], &[(4, Direction::Down)]);
        let planner = StopPlanner::new(&at_floor, false, true);
        assert_eq!(planner.decide_direction(4, Direction::None), Direction::Down);
    }

    #[test]
    fn forced_call_behaves_like_a_hall_call() {
        let v = CarCallView {
            forced: Some((1, Direction::Up)),
            ..CarCallView::default()
        };
        let planner = StopPlanner::new(&v, false, true);
        assert_eq!(planner.decide_direction(6, Direction::None), Direction::Down);
        assert_eq!(planner.next_stop(6.0, Direction::Down), Some(1));
        assert!(planner.call_at(1, Direction::Up));
    }
}
