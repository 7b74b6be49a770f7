//! Origin/destination patterns for generated passengers.
//!
//! Up-peak sends most passengers from the lobby to upper floors (morning
//! arrival); down-peak sends most of them down to the lobby. A `peak_share` of
//! passengers follows the peak; the remainder travel between uniform floors.

use rand::Rng;

use crate::scenario::{TrafficConfig, TrafficPatternKind};

/// Uniform floor in `1..=num_floors` other than `exclude`.
fn floor_other_than<R: Rng>(rng: &mut R, num_floors: u32, exclude: u32) -> u32 {
    let pick = rng.gen_range(1..num_floors);
    if pick >= exclude {
        pick + 1
    } else {
        pick
    }
}

fn uniform_trip<R: Rng>(rng: &mut R, num_floors: u32) -> (u32, u32) {
    let origin = rng.gen_range(1..=num_floors);
    (origin, floor_other_than(rng, num_floors, origin))
}

/// Samples an (origin, destination) pair with `origin != destination`.
pub fn sample_trip<R: Rng>(rng: &mut R, traffic: &TrafficConfig, num_floors: u32) -> (u32, u32) {
    let lobby = traffic.lobby_floor;
    let follows_peak = rng.gen_bool(traffic.peak_share.clamp(0.0, 1.0));
    match traffic.pattern {
        TrafficPatternKind::UpPeak if follows_peak => {
            (lobby, floor_other_than(rng, num_floors, lobby))
        }
        TrafficPatternKind::DownPeak if follows_peak => {
            (floor_other_than(rng, num_floors, lobby), lobby)
        }
        _ => uniform_trip(rng, num_floors),
    }
}
