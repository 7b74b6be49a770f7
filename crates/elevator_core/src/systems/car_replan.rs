use bevy_ecs::prelude::{Query, Res};

use crate::clock::{CurrentEvent, EventSubject};
use crate::ecs::{Car, Direction, Door, DoorState, MotionPhase};
use crate::stops::StopPlanner;
use crate::systems::CarContext;

/// Re-evaluates a car's plan after its calls changed.
///
/// An idle car picks up work. A moving car may swap its target for a nearer
/// stop as long as it can still brake for it; once decelerating the target is
/// fixed. Cars stopped at a floor replan when their door closes.
pub fn car_replan_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    mut cars: Query<(&mut Car, &mut Door)>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut car, mut door)) = cars.get_mut(entity) else {
        return;
    };

    match car.phase {
        MotionPhase::Idle if door.state == DoorState::Closed => {
            ctx.resume(entity, &mut car, &mut door, Direction::None);
        }
        MotionPhase::Moving => {
            let Some((target, direction)) = car.trip.as_ref().map(|t| (t.target, t.direction()))
            else {
                return;
            };
            let now = ctx.now();
            let view = ctx.registry.view_for(car.id);
            let planner = StopPlanner::new(&view, car.is_full(), car.full_load_bypass);
            let reachable = car.advanced_floor(now, ctx.building.floor_height) as f64;
            let next = planner.next_stop(reachable - 0.5 * direction.sign(), direction);

            if let Some(next) = next.filter(|n| *n != target) {
                if ctx.retarget(entity, &mut car, &door, next) {
                    return;
                }
            }
            let stops_at_target =
                planner.next_stop(target as f64 - 0.5 * direction.sign(), direction)
                    == Some(target);
            if let Some(trip) = car.trip.as_mut() {
                trip.move_only = !stops_at_target;
            }
        }
        _ => {}
    }
}
