#![allow(dead_code)]

use elevator_core::bus::{BusEventType, BusMessage};
use serde_json::Value;

/// Index of the first message matching `pred`.
pub fn position(messages: &[BusMessage], pred: impl Fn(&BusMessage) -> bool) -> Option<usize> {
    messages.iter().position(pred)
}

pub fn is_status(message: &BusMessage, car: u32, phase: &str) -> bool {
    message.kind == BusEventType::ElevatorStatus
        && message.data["car"] == Value::from(car)
        && message.data["phase"] == Value::from(phase)
}

pub fn is_door(message: &BusMessage, car: u32, floor: u32, event_type: &str) -> bool {
    message.kind == BusEventType::DoorEvent
        && message.data["car"] == Value::from(car)
        && message.data["floor"] == Value::from(floor)
        && message.data["event_type"] == Value::from(event_type)
}

/// Whether `message` is of `kind` and concerns the hall call at `floor` in `direction`.
pub fn is_hall(message: &BusMessage, kind: BusEventType, floor: u32, direction: &str) -> bool {
    message.kind == kind
        && message.data["floor"] == Value::from(floor)
        && message.data["direction"] == Value::from(direction)
}

pub fn car_of(message: &BusMessage) -> Option<u64> {
    message.data["car"].as_u64()
}
