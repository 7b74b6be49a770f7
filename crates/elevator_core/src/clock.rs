//! Event kernel: a min-heap of timestamped events with FIFO tie-breaking.
//!
//! Time is simulation milliseconds starting at 0. Events scheduled for the same
//! timestamp pop in the order they were scheduled, so a cascade triggered inside
//! one tick runs after everything that was already queued for that tick.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use bevy_ecs::prelude::{Entity, Resource};

use crate::ecs::Direction;

pub const ONE_SEC_MS: u64 = 1000;

/// Identifier returned by every scheduling call; pass it to [SimulationClock::cancel].
pub type EventId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    SimulationStarted,
    SpawnPassenger,
    PassengerArrival,
    HallButtonPress,
    Dispatch,
    RepositionCheck,
    CarReplan,
    CarFloorPassed,
    CarDecelerate,
    CarArrive,
    DoorOpened,
    PassengerTransfer,
    DoorClosed,
    DoorObstruction,
}

/// What an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Car(Entity),
    Passenger(Entity),
    Hall { floor: u32, direction: Direction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub seq: EventId,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

impl Event {
    pub fn id(&self) -> EventId {
        self.seq
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the earliest (timestamp, seq) first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event being processed by the current schedule run.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    next_seq: EventId,
    events: BinaryHeap<Event>,
    cancelled: HashSet<EventId>,
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current time in seconds, as published on the event bus.
    pub fn now_secs(&self) -> f64 {
        ms_to_secs(self.now)
    }

    pub fn schedule_at(
        &mut self,
        timestamp: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) -> EventId {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp: timestamp.max(self.now),
            seq,
            kind,
            subject,
        });
        seq
    }

    pub fn schedule_in(
        &mut self,
        delay_ms: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) -> EventId {
        self.schedule_at(self.now.saturating_add(delay_ms), kind, subject)
    }

    pub fn schedule_in_secs(
        &mut self,
        delay_secs: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) -> EventId {
        self.schedule_in(delay_secs.saturating_mul(ONE_SEC_MS), kind, subject)
    }

    /// Withdraw a pending event. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if id >= self.next_seq || !self.events.iter().any(|e| e.seq == id) {
            return false;
        }
        self.cancelled.insert(id)
    }

    /// Pops the next live event and advances `now` to its timestamp.
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(event) = self.events.pop() {
            if self.cancelled.remove(&event.seq) {
                continue;
            }
            self.now = event.timestamp;
            return Some(event);
        }
        None
    }

    /// Timestamp of the next live event, discarding cancelled ones at the head.
    pub fn next_event_time(&mut self) -> Option<u64> {
        while let Some(head) = self.events.peek() {
            if self.cancelled.contains(&head.seq) {
                let seq = head.seq;
                self.events.pop();
                self.cancelled.remove(&seq);
                continue;
            }
            return Some(head.timestamp);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.events.len() == self.cancelled.len()
    }

    pub fn pending(&self) -> usize {
        self.events.len() - self.cancelled.len()
    }
}

pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * ONE_SEC_MS as f64).round() as u64
}

pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / ONE_SEC_MS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, EventKind::Dispatch, None);
        clock.schedule_at(5, EventKind::Dispatch, None);
        clock.schedule_at(20, EventKind::Dispatch, None);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn same_timestamp_pops_in_schedule_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(7, EventKind::CarArrive, None);
        clock.schedule_at(7, EventKind::Dispatch, None);
        clock.schedule_at(7, EventKind::CarReplan, None);

        let kinds: Vec<_> = std::iter::from_fn(|| clock.pop_next())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::CarArrive, EventKind::Dispatch, EventKind::CarReplan]
        );
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let mut clock = SimulationClock::default();
        let first = clock.schedule_at(3, EventKind::DoorClosed, None);
        clock.schedule_at(4, EventKind::DoorOpened, None);

        assert!(clock.cancel(first));
        assert!(!clock.cancel(first), "double cancel is a no-op");
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.next_event_time(), Some(4));

        let event = clock.pop_next().expect("live event");
        assert_eq!(event.kind, EventKind::DoorOpened);
        assert!(clock.is_empty());
        assert!(!clock.cancel(first), "fired or dropped events cannot be cancelled");
    }

    #[test]
    fn schedule_in_is_relative_to_now() {
        let mut clock = SimulationClock::default();
        clock.schedule_in_secs(2, EventKind::Dispatch, None);
        let e = clock.pop_next().expect("event");
        assert_eq!(e.timestamp, 2 * ONE_SEC_MS);
        clock.schedule_in(250, EventKind::Dispatch, None);
        assert_eq!(clock.next_event_time(), Some(2250));
    }

    #[test]
    fn second_conversions_round_to_millis() {
        assert_eq!(secs_to_ms(8.6), 8600);
        assert_eq!(secs_to_ms(0.0004), 0);
        assert_eq!(secs_to_ms(-1.0), 0);
        assert_eq!(ms_to_secs(1500), 1.5);
    }
}
