pub mod log;
pub mod schedule;
pub mod world;
