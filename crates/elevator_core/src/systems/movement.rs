//! Travel events: floor passing, braking, and arrival.

use bevy_ecs::prelude::{Query, Res};
use tracing::debug;

use crate::calls::CallId;
use crate::clock::{CurrentEvent, EventSubject};
use crate::ecs::{Car, Door, MotionPhase};
use crate::stops::StopPlanner;
use crate::systems::CarContext;

pub fn floor_passed_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    cars: Query<(&Car, &Door)>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((car, door)) = cars.get(entity) else {
        return;
    };
    if car.trip.is_some() {
        ctx.publish_status(car, door);
    }
}

/// MOVING → DECELERATING. Calls at the target in the direction the car will
/// serve there are committed from here on and can no longer move to another car.
pub fn decelerate_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    mut cars: Query<(&mut Car, &Door)>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut car, door)) = cars.get_mut(entity) else {
        return;
    };
    if car.phase != MotionPhase::Moving {
        return;
    }
    let Some(target) = car.trip.as_ref().map(|t| t.target) else {
        return;
    };
    car.phase = MotionPhase::Decelerating;
    ctx.publish_status(&car, door);

    let view = ctx.registry.view_for(car.id);
    let serving = StopPlanner::new(&view, car.is_full(), car.full_load_bypass)
        .decide_direction(target, car.direction);
    let committed: Vec<CallId> = ctx
        .registry
        .pending_at(target, serving)
        .filter(|call| call.assigned_car == Some(car.id))
        .map(|call| call.id)
        .collect();
    for id in committed {
        let result = ctx.registry.commit_hall_call(id);
        ctx.faults.check(result);
    }
    debug!(car = car.id, target, serving = ?serving, "decelerating");
}

/// The car reaches its target floor: stop there, or settle if the trip was a
/// plain move.
pub fn arrive_system(
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
    let Some(trip) = car.trip.take() else {
        return;
    };
    car.floor = trip.target;

    if trip.move_only {
        let car_id = car.id;
        if ctx
            .registry
            .move_command(car_id)
            .is_some_and(|m| m.floor == trip.target)
        {
            ctx.registry.cancel_move(car_id);
        }
        ctx.settle_idle(&mut car, &door);
        ctx.replan_entity(entity);
    } else {
        ctx.begin_stop(entity, &mut car, &mut door);
    }
    ctx.request_dispatch();
}
