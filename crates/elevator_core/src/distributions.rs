//! Inter-arrival time distributions for generated passenger traffic.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::scenario::InterArrivalKind;

/// Trait for sampling inter-arrival times (in milliseconds).
pub trait InterArrivalDistribution: Send + Sync + std::fmt::Debug {
    /// Sample the next inter-arrival time in milliseconds.
    /// `spawn_count` is the number of passengers generated so far; seeded
    /// distributions derive their RNG from it so a run is reproducible.
    fn sample_ms(&self, spawn_count: u64) -> f64;
}

/// Constant inter-arrival time.
#[derive(Debug, Clone)]
pub struct UniformInterArrival {
    pub interval_ms: f64,
}

impl UniformInterArrival {
    pub fn new(interval_ms: f64) -> Self {
        Self { interval_ms }
    }

    /// Passengers per second.
    pub fn from_rate(rate_per_sec: f64) -> Self {
        if rate_per_sec <= 0.0 {
            return Self {
                interval_ms: f64::INFINITY,
            };
        }
        Self {
            interval_ms: 1000.0 / rate_per_sec,
        }
    }
}

impl InterArrivalDistribution for UniformInterArrival {
    fn sample_ms(&self, _spawn_count: u64) -> f64 {
        self.interval_ms
    }
}

/// Poisson arrivals: exponentially distributed gaps.
#[derive(Debug, Clone)]
pub struct ExponentialInterArrival {
    /// Expected passengers per second.
    pub rate_per_sec: f64,
    pub seed: u64,
}

impl ExponentialInterArrival {
    pub fn new(rate_per_sec: f64, seed: u64) -> Self {
        Self {
            rate_per_sec: rate_per_sec.max(0.0),
            seed,
        }
    }
}

impl InterArrivalDistribution for ExponentialInterArrival {
    fn sample_ms(&self, spawn_count: u64) -> f64 {
        if self.rate_per_sec <= 0.0 {
            return f64::INFINITY;
        }
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(spawn_count));
        // -ln(U) / lambda with U in (0, 1)
        let u: f64 = rng.gen();
        let u = u.max(1e-10);
        -u.ln() / self.rate_per_sec * 1000.0
    }
}

pub fn inter_arrival_for(
    kind: InterArrivalKind,
    rate_per_sec: f64,
    seed: u64,
) -> Box<dyn InterArrivalDistribution> {
    match kind {
        InterArrivalKind::Exponential => Box::new(ExponentialInterArrival::new(rate_per_sec, seed)),
        InterArrivalKind::Uniform => Box::new(UniformInterArrival::from_rate(rate_per_sec)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_inter_arrival_constant() {
        let dist = UniformInterArrival::new(1000.0);
        assert_eq!(dist.sample_ms(0), 1000.0);
        assert_eq!(dist.sample_ms(100), 1000.0);
        assert_eq!(UniformInterArrival::from_rate(2.0).interval_ms, 500.0);
    }

    #[test]
    fn exponential_is_seeded_per_spawn() {
        let dist = ExponentialInterArrival::new(0.5, 42);
        let first = dist.sample_ms(0);
        assert!(first > 0.0);
        assert_eq!(first, dist.sample_ms(0));
        assert_ne!(first, dist.sample_ms(1));
    }

    #[test]
    fn zero_rate_never_fires() {
        assert_eq!(ExponentialInterArrival::new(0.0, 1).sample_ms(0), f64::INFINITY);
        assert_eq!(UniformInterArrival::from_rate(0.0).sample_ms(3), f64::INFINITY);
    }
}
