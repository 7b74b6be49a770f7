//! Door cycle at a stop: opened, closed, and obstruction events.

use bevy_ecs::prelude::{Query, Res};
use tracing::debug;

use crate::bus::{BusEventType, DoorEventType, ForcedMovePayload};
use crate::calls::CallId;
use crate::clock::{CurrentEvent, EventKind, EventSubject};
use crate::ecs::{Car, Direction, Door, DoorState, FloorQueues, Passenger};
use crate::stops::StopPlanner;
use crate::systems::CarContext;

/// OPENING → OPEN. Picks the direction this stop serves and clears its hall
/// calls when every waiting passenger fits; the transfer loop starts right away.
pub fn door_opened_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    queues: Res<FloorQueues>,
    mut cars: Query<(&mut Car, &mut Door)>,
    passengers: Query<&Passenger>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut car, mut door)) = cars.get_mut(entity) else {
        return;
    };
    if door.state != DoorState::Opening {
        return;
    }
    door.state = DoorState::Open;
    ctx.door_event(&car, DoorEventType::OpeningComplete);

    let floor = car.floor;
    if car.serving == Direction::None {
        let view = ctx.registry.view_for(car.id);
        let planner = StopPlanner::new(&view, car.is_full(), car.full_load_bypass);
        let mut serving = planner.decide_direction(floor, car.direction);
        if serving == Direction::None {
            serving = [car.direction, Direction::Up, Direction::Down]
                .into_iter()
                .filter(|d| *d != Direction::None)
                .find(|d| queues.len(floor, *d) > 0)
                .unwrap_or(Direction::None);
        }
        car.serving = serving;
        if serving != Direction::None {
            car.direction = serving;
        }
    }
    let serving = car.serving;

    let now = ctx.now();
    let car_id = car.id;
    if ctx
        .registry
        .forced_move(car_id)
        .is_some_and(|f| f.floor == floor)
    {
        if let Some(forced) = ctx.registry.clear_forced_move(car_id) {
            ctx.bus.publish(
                now,
                BusEventType::ForcedCallOff,
                &ForcedMovePayload {
                    car: car_id,
                    floor,
                    direction: forced.direction,
                },
            );
        }
    }
    if ctx
        .registry
        .move_command(car_id)
        .is_some_and(|m| m.floor == floor)
    {
        ctx.registry.cancel_move(car_id);
    }

    let staying = car
        .onboard
        .iter()
        .filter(|p| passengers.get(**p).is_ok_and(|p| p.destination != floor))
        .count() as u32;
    let free = car.capacity.saturating_sub(staying);
    let eligible = queues
        .waiting(floor, serving)
        .filter(|p| passengers.get(*p).is_ok_and(|p| car.serves(p.destination)))
        .count() as u32;
    if serving != Direction::None && eligible <= free {
        let calls: Vec<CallId> = ctx
            .registry
            .pending_at(floor, serving)
            .map(|call| call.id)
            .collect();
        for id in calls {
            ctx.service_hall_call(id, &car);
        }
    } else if eligible > free {
        debug!(car = car_id, floor, eligible, free, "not everyone fits, keeping hall call");
    }

    door.dwell_waited = false;
    ctx.clock.schedule_at(
        now,
        EventKind::PassengerTransfer,
        Some(EventSubject::Car(entity)),
    );
}

/// CLOSING → CLOSED. The car moves on to its next stop or goes idle.
pub fn door_closed_system(
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
    if door.state != DoorState::Closing {
        return;
    }
    door.state = DoorState::Closed;
    door.close_event = None;
    door.reopen_count = 0;
    ctx.door_event(&car, DoorEventType::ClosingComplete);

    let heading = match car.serving {
        Direction::None => car.direction,
        serving => serving,
    };
    if !ctx.resume(entity, &mut car, &mut door, heading) {
        ctx.settle_idle(&mut car, &door);
    }
    ctx.request_dispatch();
}

/// Something blocks the doorway. A closing door reopens, up to the per-stop limit.
pub fn door_obstruction_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    mut cars: Query<(&Car, &mut Door)>,
) {
    let Some(EventSubject::Car(entity)) = event.0.subject else {
        return;
    };
    let Ok((car, mut door)) = cars.get_mut(entity) else {
        return;
    };
    if !ctx.reopen(entity, car, &mut door) {
        debug!(car = car.id, floor = car.floor, door = ?door.state, "obstruction ignored");
    }
}
