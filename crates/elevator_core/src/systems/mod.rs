pub mod car_replan;
pub mod context;
pub mod door;
pub mod group_control;
pub mod hall_button;
pub mod movement;
pub mod passenger_arrival;
pub mod passenger_transfer;
pub mod spawner;

pub use context::CarContext;
