//! Arrival-time prediction from registered calls only.
//!
//! The predictor replays the car's selective-collective stop sequence over the
//! calls it already holds, with the candidate call added, and sums S-curve travel
//! times plus a fixed time per intermediate stop. Passengers that have not called
//! yet are invisible to it.

use crate::calls::CarCallView;
use crate::ecs::{Direction, MotionPhase};
use crate::kinematics::SCurveProfile;
use crate::stops::StopPlanner;

use super::snapshot::{CarSnapshot, DispatchSnapshot};

#[derive(Debug, Clone, Copy)]
pub struct ArrivalPredictor {
    pub stop_time_secs: f64,
}

impl Default for ArrivalPredictor {
    fn default() -> Self {
        Self {
            stop_time_secs: 5.0,
        }
    }
}

impl ArrivalPredictor {
    pub fn new(stop_time_secs: f64) -> Self {
        Self { stop_time_secs }
    }

    /// Seconds until `car` could start opening its door at `floor` to serve
    /// `direction`. `None` when the replay never reaches the call.
    pub fn predict(
        &self,
        car: &CarSnapshot,
        floor: u32,
        direction: Direction,
        snapshot: &DispatchSnapshot,
    ) -> Option<f64> {
        let mut view: CarCallView = car.calls.clone();
        view.move_target = None;
        if !view.hall_calls.contains(&(floor, direction)) {
            view.hall_calls.push((floor, direction));
        }

        let h = snapshot.floor_height;
        let mut t = 0.0;
        let mut dir = car.direction;
        let mut pos = car.advanced_floor;
        // Continuous position the next leg starts from, and the sweep origin for stop search.
        let mut leg_start = pos as f64;
        let mut sweep_from = pos as f64;
        let mut at_stop = true;
        let mut charge_stop = false;
        match car.phase {
            MotionPhase::Idle => {}
            MotionPhase::Stopping => t += self.stop_time_secs / 2.0,
            MotionPhase::Moving | MotionPhase::Decelerating => {
                // The advanced floor is still reachable, so search from just behind it.
                leg_start = car.position;
                sweep_from = pos as f64 - dir.sign() * 0.5;
                at_stop = false;
            }
        }

        let max_steps = 2 * (view.car_calls.len() + view.hall_calls.len() + 2);
        for _ in 0..max_steps {
            if at_stop {
                let serving =
                    StopPlanner::new(&view, false, car.full_load_bypass).decide_direction(pos, dir);
                if pos == floor && serving == direction {
                    return Some(t);
                }
                remove_served(&mut view, pos, serving);
                if charge_stop {
                    t += self.stop_time_secs;
                }
                dir = serving;
            }

            let planner = StopPlanner::new(&view, false, car.full_load_bypass);
            let (next, next_dir) = match planner.next_stop(sweep_from, dir) {
                Some(next) => (next, dir),
                None => {
                    let turned = planner.decide_direction(pos, dir);
                    (planner.next_stop(pos as f64, turned)?, turned)
                }
            };
            t += SCurveProfile::new((next as f64 - leg_start) * h, car.limits).total_time();
            pos = next;
            dir = next_dir;
            leg_start = pos as f64;
            sweep_from = pos as f64;
            at_stop = true;
            charge_stop = true;
        }
        None
    }
}

fn remove_served(view: &mut CarCallView, floor: u32, serving: Direction) {
    view.car_calls.retain(|f| *f != floor);
    view.hall_calls
        .retain(|(f, d)| !(*f == floor && *d == serving));
    if view.forced.is_some_and(|(f, _)| f == floor) {
        view.forced = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test_support::{car, snapshot};

    #[test]
    fn idle_car_eta_is_pure_travel_time() {
        let idle = car(0, 1);
        let snap = snapshot(vec![idle.clone()], vec![]);
        let eta = ArrivalPredictor::default()
            .predict(&idle, 5, Direction::Up, &snap)
            .expect("eta");
        assert!((eta - 8.6).abs() < 1e-6);
    }

    #[test]
    fn call_at_current_floor_is_immediate() {
        let idle = car(0, 4);
        let snap = snapshot(vec![idle.clone()], vec![]);
        let eta = ArrivalPredictor::default()
            .predict(&idle, 4, Direction::Down, &snap)
            .expect("eta");
        assert_eq!(eta, 0.0);
    }

    #[test]
    fn intermediate_stops_add_stop_time() {
        let mut busy = car(0, 1);
        busy.calls.car_calls.push(3);
        let snap = snapshot(vec![busy.clone()], vec![]);
        let predictor = ArrivalPredictor::new(5.0);
        let eta = predictor.predict(&busy, 5, Direction::Up, &snap).expect("eta");
        let leg = |floors: f64| SCurveProfile::new(floors * 3.5, busy.limits).total_time();
        assert!((eta - (leg(2.0) + 5.0 + leg(2.0))).abs() < 1e-6);
    }

    #[test]
    fn opposite_direction_call_waits_for_the_sweep() {
        let mut busy = car(0, 2);
        busy.direction = Direction::Up;
        busy.calls.car_calls.push(8);
        let snap = snapshot(vec![busy.clone()], vec![]);
        let predictor = ArrivalPredictor::new(5.0);
        let down_at_5 = predictor
            .predict(&busy, 5, Direction::Down, &snap)
            .expect("eta");
        let up_at_5 = predictor.predict(&busy, 5, Direction::Up, &snap).expect("eta");
        assert!(down_at_5 > up_at_5);
    }
}
