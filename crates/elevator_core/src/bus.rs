//! Observer event bus.
//!
//! Systems publish one message per state-changing transition. Subscribers are
//! called synchronously, in subscription order, before the publishing system
//! continues, so every subscriber sees messages in causal order.

use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::calls::CallId;
use crate::clock::ms_to_secs;
use crate::ecs::{CarId, Direction, DoorState, MotionPhase, PassengerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusEventType {
    ElevatorStatus,
    HallCallRegistered,
    HallCallAssignment,
    HallCallOff,
    CarCallRegistered,
    CarCallOff,
    ForcedMoveCommand,
    ForcedCallOff,
    MoveCommand,
    FullLoadBypass,
    PassengerWaiting,
    PassengerBoarding,
    PassengerAlighting,
    DoorEvent,
}

/// Wire form: `{"time": <seconds>, "type": "<snake_case>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub time: f64,
    #[serde(rename = "type")]
    pub kind: BusEventType,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorEventType {
    OpeningStart,
    OpeningComplete,
    ClosingStart,
    ClosingComplete,
    Reopening,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElevatorStatus {
    pub car: CarId,
    pub floor: f64,
    pub direction: Direction,
    pub phase: MotionPhase,
    pub door: DoorState,
    pub load: u32,
    pub capacity: u32,
    pub target: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HallCallPayload {
    pub call: CallId,
    pub floor: u32,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentPayload {
    pub call: CallId,
    pub floor: u32,
    pub direction: Direction,
    pub car: CarId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_car: Option<CarId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HallCallOffPayload {
    pub call: CallId,
    pub floor: u32,
    pub direction: Direction,
    pub car: CarId,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarCallPayload {
    pub car: CarId,
    pub floor: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForcedMovePayload {
    pub car: CarId,
    pub floor: u32,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveCommandPayload {
    pub car: CarId,
    pub floor: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullLoadBypassPayload {
    pub car: CarId,
    pub direction: Direction,
    pub floors: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerPayload {
    pub passenger: PassengerId,
    pub floor: u32,
    pub destination: u32,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car: Option<CarId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoorEventPayload {
    pub car: CarId,
    pub floor: u32,
    pub event_type: DoorEventType,
}

/// Read-only observer of bus messages.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&mut self, message: &BusMessage);
}

#[derive(Default, Resource)]
pub struct EventBus {
    subscribers: Vec<Box<dyn EventSubscriber>>,
    published: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("published", &self.published)
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn publish<T: Serialize>(&mut self, now_ms: u64, kind: BusEventType, payload: &T) {
        let data = serde_json::to_value(payload).unwrap_or_else(|err| {
            warn!(?kind, %err, "bus payload failed to serialize");
            Value::Null
        });
        let message = BusMessage {
            time: ms_to_secs(now_ms),
            kind,
            data,
        };
        self.published += 1;
        for subscriber in &mut self.subscribers {
            subscriber.on_event(&message);
        }
    }

    pub fn door_event(&mut self, now_ms: u64, car: CarId, floor: u32, event_type: DoorEventType) {
        self.publish(
            now_ms,
            BusEventType::DoorEvent,
            &DoorEventPayload {
                car,
                floor,
                event_type,
            },
        );
    }
}

/// Subscriber that keeps every message; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    messages: Arc<Mutex<Vec<BusMessage>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON array of every message, in publication order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.messages())
    }
}

impl EventSubscriber for EventLog {
    fn on_event(&mut self, message: &BusMessage) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push(message.clone());
        }
    }
}

/// Subscriber that forwards messages to a closure.
pub struct FnSubscriber<F>(pub F);

impl<F> EventSubscriber for FnSubscriber<F>
where
    F: FnMut(&BusMessage) + Send + Sync,
{
    fn on_event(&mut self, message: &BusMessage) {
        (self.0)(message)
    }
}

/// `floor` is where the event happens: the origin for waiting and boarding, the
/// destination for alighting.
pub fn passenger_payload(
    id: PassengerId,
    floor: u32,
    destination: u32,
    direction: Direction,
    car: Option<CarId>,
) -> PassengerPayload {
    PassengerPayload {
        passenger: id,
        floor,
        destination,
        direction,
        car,
    }
}
