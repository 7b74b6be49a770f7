//! Repositioning of idle cars.
//!
//! Strategies look at idle cars and the recent call history and may issue a
//! forced move (the car stops with the door open, as for a hall call) or a plain
//! move command (the car parks with the door shut). Both are superseded the
//! moment a real hall call is assigned to the car.

use std::collections::{BTreeMap, BTreeSet};

use bevy_ecs::prelude::Resource;

use crate::clock::secs_to_ms;
use crate::ecs::{CarId, Direction};
use crate::scenario::RepositioningKind;

use super::snapshot::DispatchSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepositionAction {
    Forced {
        car: CarId,
        floor: u32,
        direction: Direction,
    },
    Move {
        car: CarId,
        floor: u32,
    },
    /// Re-run repositioning at this time (e.g. when an idle delay runs out).
    RecheckAt(u64),
}

/// Floors of registered hall calls, with registration times.
#[derive(Debug, Default, Resource)]
pub struct DemandHistory {
    entries: Vec<(u64, u32)>,
}

impl DemandHistory {
    pub fn record(&mut self, at: u64, floor: u32) {
        self.entries.push((at, floor));
    }

    /// Calls per floor registered at or after `since`.
    pub fn counts_since(&self, since: u64) -> BTreeMap<u32, u32> {
        let mut counts = BTreeMap::new();
        for (_, floor) in self.entries.iter().filter(|(at, _)| *at >= since) {
            *counts.entry(*floor).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub trait RepositioningStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn reposition(
        &mut self,
        snapshot: &DispatchSnapshot,
        demand: &DemandHistory,
    ) -> Vec<RepositionAction>;
}

#[derive(Debug, Default)]
pub struct NoRepositioning;

impl RepositioningStrategy for NoRepositioning {
    fn name(&self) -> &'static str {
        "none"
    }

    fn reposition(&mut self, _: &DispatchSnapshot, _: &DemandHistory) -> Vec<RepositionAction> {
        Vec::new()
    }
}

/// Sends a car idling away from home back there, once per idle period.
#[derive(Debug, Default)]
pub struct LobbyReturn {
    idle_delay_ms: u64,
    /// Idle period (by its start time) for which a car was already sent home.
    issued: BTreeMap<CarId, u64>,
}

impl LobbyReturn {
    pub fn new(idle_delay_ms: u64) -> Self {
        Self {
            idle_delay_ms,
            issued: BTreeMap::new(),
        }
    }
}

impl RepositioningStrategy for LobbyReturn {
    fn name(&self) -> &'static str {
        "lobby_return"
    }

    fn reposition(&mut self, snapshot: &DispatchSnapshot, _: &DemandHistory) -> Vec<RepositionAction> {
        let mut actions = Vec::new();
        for car in snapshot.cars.iter().filter(|c| c.is_idle()) {
            let Some(idle_since) = car.idle_since else {
                continue;
            };
            if car.advanced_floor == car.home_floor || self.issued.get(&car.id) == Some(&idle_since)
            {
                continue;
            }
            let due = idle_since.saturating_add(self.idle_delay_ms);
            if snapshot.now < due {
                actions.push(RepositionAction::RecheckAt(due));
                continue;
            }
            self.issued.insert(car.id, idle_since);
            actions.push(RepositionAction::Forced {
                car: car.id,
                floor: car.home_floor,
                direction: car.main_direction,
            });
        }
        actions
    }
}

/// Parks idle cars at the floors with the most recent calls.
#[derive(Debug, Default)]
pub struct DemandParking {
    idle_delay_ms: u64,
    window_ms: u64,
    issued: BTreeMap<CarId, u64>,
}

impl DemandParking {
    pub fn new(idle_delay_ms: u64, window_ms: u64) -> Self {
        Self {
            idle_delay_ms,
            window_ms,
            issued: BTreeMap::new(),
        }
    }
}

impl RepositioningStrategy for DemandParking {
    fn name(&self) -> &'static str {
        "demand_parking"
    }

    fn reposition(
        &mut self,
        snapshot: &DispatchSnapshot,
        demand: &DemandHistory,
    ) -> Vec<RepositionAction> {
        let mut hot: Vec<(u32, u32)> = demand
            .counts_since(snapshot.now.saturating_sub(self.window_ms))
            .into_iter()
            .collect();
        if hot.is_empty() {
            return Vec::new();
        }
        // Busiest first; lower floor wins ties.
        hot.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut covered: BTreeSet<u32> = snapshot
            .cars
            .iter()
            .filter_map(|c| {
                c.calls
                    .move_target
                    .or_else(|| c.is_idle().then_some(c.advanced_floor))
            })
            .collect();

        let mut actions = Vec::new();
        for car in snapshot.cars.iter().filter(|c| c.is_idle()) {
            let Some(idle_since) = car.idle_since else {
                continue;
            };
            if self.issued.get(&car.id) == Some(&idle_since) {
                continue;
            }
            let due = idle_since.saturating_add(self.idle_delay_ms);
            if snapshot.now < due {
                actions.push(RepositionAction::RecheckAt(due));
                continue;
            }
            if hot.first().is_some_and(|(floor, _)| *floor == car.advanced_floor) {
                continue;
            }
            let target = hot
                .iter()
                .map(|(floor, _)| *floor)
                .find(|floor| car.serves(*floor) && !covered.contains(floor));
            if let Some(floor) = target {
                self.issued.insert(car.id, idle_since);
                covered.insert(floor);
                actions.push(RepositionAction::Move { car: car.id, floor });
            }
        }
        actions
    }
}

pub fn build_repositioning(kind: RepositioningKind) -> Box<dyn RepositioningStrategy> {
    match kind {
        RepositioningKind::None => Box::new(NoRepositioning),
        RepositioningKind::LobbyReturn { idle_delay_secs } => {
            Box::new(LobbyReturn::new(secs_to_ms(idle_delay_secs)))
        }
        RepositioningKind::DemandParking {
            idle_delay_secs,
            window_secs,
        } => Box::new(DemandParking::new(
            secs_to_ms(idle_delay_secs),
            secs_to_ms(window_secs),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test_support::{car, snapshot};

    #[test]
    fn lobby_return_waits_for_idle_delay_then_fires_once() {
        let mut away = car(0, 6);
        away.idle_since = Some(1_000);
        let mut strategy = LobbyReturn::new(5_000);
        let demand = DemandHistory::default();

        let mut early = snapshot(vec![away.clone()], vec![]);
        early.now = 2_000;
        assert_eq!(
            strategy.reposition(&early, &demand),
            vec![RepositionAction::RecheckAt(6_000)]
        );

        let mut due = snapshot(vec![away.clone()], vec![]);
        due.now = 6_000;
        assert_eq!(
            strategy.reposition(&due, &demand),
            vec![RepositionAction::Forced {
                car: 0,
                floor: 1,
                direction: Direction::Up
            }]
        );
        assert!(strategy.reposition(&due, &demand).is_empty());
    }

    #[test]
    fn lobby_return_ignores_cars_at_home() {
        let mut home = car(0, 1);
        home.idle_since = Some(0);
        let mut strategy = LobbyReturn::new(0);
        let snap = snapshot(vec![home], vec![]);
        assert!(strategy
            .reposition(&snap, &DemandHistory::default())
            .is_empty());
    }

    #[test]
    fn demand_parking_spreads_cars_over_busy_floors() {
        let mut a = car(0, 1);
        a.idle_since = Some(0);
        let mut b = car(1, 2);
        b.idle_since = Some(0);
        let mut demand = DemandHistory::default();
        for (at, floor) in [(0, 7), (10, 7), (20, 4), (30, 7), (40, 4), (50, 9)] {
            demand.record(at, floor);
        }
        let mut strategy = DemandParking::new(0, 60_000);
        let mut snap = snapshot(vec![a, b], vec![]);
        snap.now = 100;
        assert_eq!(
            strategy.reposition(&snap, &demand),
            vec![
                RepositionAction::Move { car: 0, floor: 7 },
                RepositionAction::Move { car: 1, floor: 4 },
            ]
        );
    }
}
