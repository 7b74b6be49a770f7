use bevy_ecs::prelude::Res;

use crate::clock::{CurrentEvent, EventSubject};
use crate::systems::CarContext;

/// A hall button press with no passenger model behind it.
pub fn hall_button_system(event: Res<CurrentEvent>, mut ctx: CarContext) {
    let Some(EventSubject::Hall { floor, direction }) = event.0.subject else {
        return;
    };
    let now = ctx.now();
    let result = ctx.registry.register_hall_call(floor, direction, now);
    if let Some((id, true)) = ctx.faults.check(result) {
        ctx.publish_hall_call(id);
    }
    ctx.request_dispatch();
}
