pub mod registry;
pub mod types;

pub use registry::{AssignOutcome, CallRegistry};
pub use types::{
    CallId, CallMode, CallSnapshot, CarCall, CarCallView, ForcedMove, HallCall, MoveCommand,
};
