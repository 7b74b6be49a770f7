pub mod allocation;
pub mod earliest_arrival;
pub mod nearest_car;
pub mod prediction;
pub mod reassignment;
pub mod repositioning;
pub mod snapshot;

use std::collections::BTreeSet;

use bevy_ecs::prelude::Resource;

use crate::calls::CallId;
use crate::clock::{EventKind, SimulationClock};
use crate::ecs::CarId;
use crate::scenario::AllocationKind;

pub use allocation::{ranked_candidates, Allocation, AllocationStrategy};
pub use earliest_arrival::EarliestArrival;
pub use nearest_car::NearestCar;
pub use prediction::ArrivalPredictor;
pub use reassignment::{plan_reassignments, Reassignment};
pub use repositioning::{
    build_repositioning, DemandHistory, DemandParking, LobbyReturn, NoRepositioning,
    RepositionAction, RepositioningStrategy,
};
pub use snapshot::{CarSnapshot, DispatchSnapshot};

/// Resource wrapper for the allocation strategy trait object.
#[derive(Resource)]
pub struct AllocationResource(pub Box<dyn AllocationStrategy>);

impl AllocationResource {
    pub fn new(strategy: Box<dyn AllocationStrategy>) -> Self {
        Self(strategy)
    }
}

impl std::ops::Deref for AllocationResource {
    type Target = dyn AllocationStrategy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Resource wrapper for the repositioning strategy trait object.
#[derive(Resource)]
pub struct RepositioningResource(pub Box<dyn RepositioningStrategy>);

impl RepositioningResource {
    pub fn new(strategy: Box<dyn RepositioningStrategy>) -> Self {
        Self(strategy)
    }
}

impl std::ops::Deref for RepositioningResource {
    type Target = dyn RepositioningStrategy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::ops::DerefMut for RepositioningResource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

pub fn build_allocation(kind: AllocationKind, stop_time_secs: f64) -> Box<dyn AllocationStrategy> {
    match kind {
        AllocationKind::NearestCar => Box::new(NearestCar),
        AllocationKind::EarliestArrival => {
            Box::new(EarliestArrival::new(ArrivalPredictor::new(stop_time_secs)))
        }
    }
}

/// Coalesces dispatch triggers: at most one `Dispatch` event is queued per instant.
#[derive(Debug, Default, Resource)]
pub struct DispatchState {
    pending_at: Option<u64>,
    recheck_at: Option<u64>,
    /// Calls a car left behind with passengers it cannot carry.
    declined: BTreeSet<(CallId, CarId)>,
    pub passes: u64,
    pub deferred: u64,
}

impl DispatchState {
    pub fn request(&mut self, clock: &mut SimulationClock) {
        let now = clock.now();
        if self.pending_at == Some(now) {
            return;
        }
        self.pending_at = Some(now);
        clock.schedule_at(now, EventKind::Dispatch, None);
    }

    /// Called by the coordinator when a pass starts.
    pub fn begin_pass(&mut self) {
        self.pending_at = None;
        self.passes += 1;
    }

    /// Schedules a repositioning recheck unless an earlier-or-equal one is queued.
    pub fn request_recheck(&mut self, clock: &mut SimulationClock, at: u64) {
        if self.recheck_at.is_some_and(|queued| queued <= at && queued >= clock.now()) {
            return;
        }
        self.recheck_at = Some(at);
        clock.schedule_at(at, EventKind::RepositionCheck, None);
    }

    pub fn recheck_fired(&mut self) {
        self.recheck_at = None;
    }

    pub fn decline(&mut self, call: CallId, car: CarId) {
        self.declined.insert((call, car));
    }

    pub fn is_declined(&self, call: CallId, car: CarId) -> bool {
        self.declined.contains(&(call, car))
    }

    /// Drops declined pairs whose call is no longer pending.
    pub fn prune_declined(&mut self, is_pending: impl Fn(CallId) -> bool) {
        self.declined.retain(|(call, _)| is_pending(*call));
    }

    pub fn declined_len(&self) -> usize {
        self.declined.len()
    }
}
