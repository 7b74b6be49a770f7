//! Group controller: allocates hall calls to cars and repositions idle ones.
//!
//! A pass runs on every `Dispatch` and `RepositionCheck` event: purge serviced
//! calls, reposition idle cars, allocate unassigned calls, then move uncommitted
//! ones if reassignment is enabled. Strategies only ever see a [DispatchSnapshot]
//! of registered state; waiting passengers who have not pressed a button yet are
//! invisible to them.

use std::collections::{BTreeMap, BTreeSet};

use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use tracing::debug;

use crate::bus::{AssignmentPayload, BusEventType, ForcedMovePayload, MoveCommandPayload};
use crate::calls::{CallId, HallCall};
use crate::clock::{CurrentEvent, EventKind};
use crate::dispatch::{
    plan_reassignments, ranked_candidates, AllocationResource, CarSnapshot, DispatchSnapshot,
    RepositionAction, RepositioningResource,
};
use crate::ecs::{Car, CarId, Door};
use crate::scenario::DispatchConfig;
use crate::systems::CarContext;

fn take_snapshot(
    ctx: &CarContext,
    config: &DispatchConfig,
    cars: &Query<(Entity, &Car, &Door)>,
) -> DispatchSnapshot {
    let now = ctx.now();
    let h = ctx.building.floor_height;
    let snapshots = cars
        .iter()
        .map(|(entity, car, door)| {
            CarSnapshot::from_car(entity, car, door, &ctx.registry, now, h)
        })
        .collect();
    DispatchSnapshot::new(
        now,
        &ctx.building,
        config.stop_time_secs,
        snapshots,
        &ctx.registry,
    )
}

/// Assigns `call` to `car` and publishes the assignment plus anything it supersedes.
fn assign(
    ctx: &mut CarContext,
    call: &HallCall,
    car: CarId,
    released_from: Option<CarId>,
    affected: &mut BTreeSet<CarId>,
) -> bool {
    let now = ctx.now();
    let result = ctx.registry.assign_hall_call(call.id, car, now);
    let Some(outcome) = ctx.faults.check(result) else {
        return false;
    };
    let previous_car = outcome.previous_car.or(released_from);
    ctx.bus.publish(
        now,
        BusEventType::HallCallAssignment,
        &AssignmentPayload {
            call: call.id,
            floor: call.floor,
            direction: call.direction,
            car,
            previous_car,
        },
    );
    if let Some(forced) = outcome.cleared_forced {
        ctx.bus.publish(
            now,
            BusEventType::ForcedCallOff,
            &ForcedMovePayload {
                car,
                floor: forced.floor,
                direction: forced.direction,
            },
        );
    }
    if let Some(cancelled) = outcome.cancelled_move {
        debug!(car, floor = cancelled.floor, "move command superseded by assignment");
    }
    affected.insert(car);
    affected.extend(previous_car);
    debug!(call = call.id, floor = call.floor, car, previous = ?previous_car, "hall call assigned");
    true
}

pub fn group_control_system(
    event: Res<CurrentEvent>,
    mut ctx: CarContext,
    allocation: Res<AllocationResource>,
    mut repositioning: ResMut<RepositioningResource>,
    config: Res<DispatchConfig>,
    cars: Query<(Entity, &Car, &Door)>,
) {
    match event.0.kind {
        EventKind::Dispatch => ctx.dispatch.begin_pass(),
        _ => ctx.dispatch.recheck_fired(),
    }
    ctx.registry.purge_cleared();
    let registry = &ctx.registry;
    ctx.dispatch
        .prune_declined(|id| registry.hall_call(id).is_some_and(HallCall::is_pending));
    let now = ctx.now();
    let mut affected = BTreeSet::new();

    let mut snapshot = take_snapshot(&ctx, &config, &cars);

    // Full cars give up calls they have not committed to.
    let mut released: BTreeMap<CallId, CarId> = BTreeMap::new();
    let stranded: Vec<(CallId, CarId)> = snapshot
        .calls
        .hall_calls
        .iter()
        .filter(|call| !call.committed)
        .filter_map(|call| call.assigned_car.map(|car| (call.id, car)))
        .filter(|(_, car)| snapshot.car(*car).is_some_and(CarSnapshot::is_full))
        .collect();
    for (id, car) in stranded {
        let result = ctx.registry.release_hall_call(id);
        if ctx.faults.check(result).is_some() {
            released.insert(id, car);
            affected.insert(car);
        }
    }
    if !released.is_empty() {
        snapshot = take_snapshot(&ctx, &config, &cars);
    }

    let actions = repositioning.reposition(&snapshot, &ctx.demand);
    let mut repositioned = false;
    for action in actions {
        match action {
            RepositionAction::Forced {
                car,
                floor,
                direction,
            } => {
                let result = ctx.registry.issue_forced_move(car, floor, direction, now);
                if ctx.faults.check(result).is_some() {
                    ctx.bus.publish(
                        now,
                        BusEventType::ForcedMoveCommand,
                        &ForcedMovePayload {
                            car,
                            floor,
                            direction,
                        },
                    );
                    affected.insert(car);
                    repositioned = true;
                }
            }
            RepositionAction::Move { car, floor } => {
                let result = ctx.registry.issue_move(car, floor, now);
                if ctx.faults.check(result).is_some() {
                    ctx.bus
                        .publish(now, BusEventType::MoveCommand, &MoveCommandPayload { car, floor });
                    affected.insert(car);
                    repositioned = true;
                }
            }
            RepositionAction::RecheckAt(at) => {
                ctx.dispatch.request_recheck(&mut ctx.clock, at.max(now));
            }
        }
    }
    if repositioned {
        snapshot = take_snapshot(&ctx, &config, &cars);
    }

    for id in ctx.registry.unassigned_ids() {
        let Some(call) = ctx.registry.hall_call(id).cloned() else {
            continue;
        };
        let choice = ranked_candidates(&**allocation, &call, &snapshot)
            .into_iter()
            .map(|(car, _)| car)
            .find(|car| !ctx.dispatch.is_declined(id, *car));
        match choice {
            Some(car) => {
                if assign(&mut ctx, &call, car, released.get(&id).copied(), &mut affected) {
                    snapshot.note_assignment(&call, car);
                }
            }
            None => {
                ctx.dispatch.deferred += 1;
                debug!(call = id, floor = call.floor, strategy = allocation.name(), "no eligible car, deferring");
            }
        }
    }

    for moved in plan_reassignments(&**allocation, &snapshot, &config.reassignment) {
        if ctx.dispatch.is_declined(moved.call, moved.to) {
            continue;
        }
        let Some(call) = ctx.registry.hall_call(moved.call).cloned() else {
            continue;
        };
        if assign(&mut ctx, &call, moved.to, Some(moved.from), &mut affected) {
            snapshot.note_assignment(&call, moved.to);
        }
    }

    for car in affected {
        ctx.replan(car);
    }
}
