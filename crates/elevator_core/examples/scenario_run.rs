//! Run a twelve-floor up-peak scenario with three cars and print journey statistics.
//!
//! Run with: cargo run -p elevator_core --example scenario_run
//! Set RUST_LOG=elevator_core=debug for per-event tracing.

use elevator_core::scenario::{
    AllocationKind, RepositioningKind, ScenarioParams, TrafficConfig, TrafficPatternKind,
};
use elevator_core::simulation::ElevatorSimulation;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    const FLOORS: u32 = 12;
    const CARS: usize = 3;
    const TRAFFIC_SECS: f64 = 1800.0;

    let params = ScenarioParams::default()
        .with_seed(123)
        .with_floors(FLOORS)
        .with_cars(CARS)
        .with_allocation(AllocationKind::EarliestArrival)
        .with_repositioning(RepositioningKind::LobbyReturn {
            idle_delay_secs: 60.0,
        })
        .with_traffic(TrafficConfig {
            pattern: TrafficPatternKind::UpPeak,
            duration_secs: TRAFFIC_SECS,
            arrival_rate: 0.15,
            ..TrafficConfig::default()
        });

    let mut sim = match ElevatorSimulation::new(params) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("invalid scenario: {err}");
            std::process::exit(1);
        }
    };
    let log = sim.event_log();

    // Traffic stops after the window; allow enough steps for the building to drain.
    let steps = match sim.run_to_completion(5_000_000) {
        Ok(steps) => steps,
        Err(err) => {
            eprintln!("simulation aborted: {err}");
            std::process::exit(1);
        }
    };

    let telemetry = sim.telemetry();
    println!(
        "--- Scenario run ({} floors, {} cars, {:.0} s up-peak, seed 123) ---",
        FLOORS, CARS, TRAFFIC_SECS
    );
    println!("Steps executed: {}", steps);
    println!("Simulation time: {:.1} s", sim.now_secs());
    println!("Bus messages: {}", log.len());
    println!("Completed journeys: {}", telemetry.completed_journeys.len());
    println!("Serviced hall calls: {}", telemetry.serviced_hall_calls.len());
    let show = |label: &str, value: Option<f64>| match value {
        Some(v) => println!("{label}: {v:.1} s"),
        None => println!("{label}: n/a"),
    };
    show("Average wait", telemetry.average_wait_secs());
    show("Average journey", telemetry.average_journey_secs());
    show("Average hall call response", telemetry.average_response_secs());
    for (car, peak) in &telemetry.peak_loads {
        println!("  car {car}: peak load {peak}");
    }
    println!();
    print!("{}", sim.metrics().summary());
}
