pub mod bus;
pub mod calls;
pub mod clock;
pub mod dispatch;
pub mod distributions;
pub mod ecs;
pub mod error;
pub mod kinematics;
pub mod patterns;
pub mod profiling;
pub mod runner;
pub mod scenario;
pub mod simulation;
pub mod spawner;
pub mod stops;
pub mod systems;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
