use bevy_ecs::prelude::{Entity, Query, Res, ResMut};

use crate::bus::{passenger_payload, BusEventType};
use crate::clock::{CurrentEvent, EventSubject};
use crate::ecs::{Car, Door, FloorQueues, MotionPhase, Passenger, PassengerState};
use crate::systems::CarContext;

/// A passenger reaches the hall: queue, press the button, and hold a closing
/// door that is about to leave in their direction.
pub fn passenger_arrival_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    mut queues: ResMut<FloorQueues>,
    mut passengers: Query<&mut Passenger>,
    mut cars: Query<(Entity, &Car, &mut Door)>,
) {
    let Some(EventSubject::Passenger(entity)) = event.0.subject else {
        return;
    };
    let Ok(mut passenger) = passengers.get_mut(entity) else {
        return;
    };
    if passenger.state != PassengerState::Pending {
        return;
    }

    let now = ctx.now();
    let (origin, destination) = (passenger.origin, passenger.destination);
    let direction = passenger.direction();
    passenger.state = PassengerState::Waiting;
    passenger.call_time = Some(now);
    queues.push(origin, direction, entity);
    ctx.bus.publish(
        now,
        BusEventType::PassengerWaiting,
        &passenger_payload(passenger.id, origin, destination, direction, None),
    );
    passenger.hall_call = ctx.register_passenger_call(origin, direction, destination);

    for (car_entity, car, mut door) in cars.iter_mut() {
        let leaving_here = car.floor == origin
            && car.phase == MotionPhase::Stopping
            && car.serving == direction
            && !car.is_full();
        if leaving_here && ctx.reopen(car_entity, car, &mut door) {
            break;
        }
    }

    ctx.request_dispatch();
}
