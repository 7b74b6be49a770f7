//! Jerk-limited (S-curve) point-to-point motion.
//!
//! A profile is seven segments of constant jerk: jerk up, constant acceleration,
//! jerk down, cruise, jerk down, constant deceleration, jerk up. Short trips drop
//! the cruise segment and, if they are short enough, the constant-acceleration
//! segments too. Distances are metres, times seconds.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;
const AGREEMENT_TOLERANCE: f64 = 1e-6;

/// Kinematic limits of one car.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub max_jerk: f64,
}

impl MotionLimits {
    pub fn new(max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
            max_jerk,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.max_velocity, self.max_acceleration, self.max_jerk]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Jerk-limited ramp from rest to `peak_velocity`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    jerk_time: f64,
    const_accel_time: f64,
    peak_velocity: f64,
}

impl Ramp {
    fn to_velocity(peak_velocity: f64, limits: &MotionLimits) -> Self {
        let a = limits.max_acceleration;
        let j = limits.max_jerk;
        if peak_velocity * j >= a * a {
            Self {
                jerk_time: a / j,
                const_accel_time: peak_velocity / a - a / j,
                peak_velocity,
            }
        } else {
            Self {
                jerk_time: (peak_velocity / j).sqrt(),
                const_accel_time: 0.0,
                peak_velocity,
            }
        }
    }

    fn duration(&self) -> f64 {
        2.0 * self.jerk_time + self.const_accel_time
    }

    /// The velocity curve is point-symmetric about the ramp midpoint.
    fn distance(&self) -> f64 {
        self.peak_velocity * self.duration() / 2.0
    }
}

/// Distance needed to brake to rest from cruise at `velocity`.
pub fn braking_distance(velocity: f64, limits: &MotionLimits) -> f64 {
    if velocity <= EPS {
        return 0.0;
    }
    Ramp::to_velocity(velocity, limits).distance()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: f64,
    duration: f64,
    jerk: f64,
    p0: f64,
    v0: f64,
    a0: f64,
}

impl Segment {
    fn state_at(&self, t: f64) -> (f64, f64, f64) {
        let t = t.clamp(0.0, self.duration);
        let j = self.jerk;
        let p = self.p0 + self.v0 * t + self.a0 * t * t / 2.0 + j * t * t * t / 6.0;
        let v = self.v0 + self.a0 * t + j * t * t / 2.0;
        let a = self.a0 + j * t;
        (p, v, a)
    }
}

/// Minimum-time rest-to-rest profile over a signed distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SCurveProfile {
    distance: f64,
    sign: f64,
    limits: MotionLimits,
    ramp: Ramp,
    cruise_time: f64,
    total_time: f64,
    segments: Vec<Segment>,
}

impl SCurveProfile {
    pub fn new(distance: f64, limits: MotionLimits) -> Self {
        let sign = if distance < 0.0 { -1.0 } else { 1.0 };
        let d = distance.abs();
        if d <= EPS || !limits.is_valid() {
            return Self {
                distance: 0.0,
                sign,
                limits,
                ramp: Ramp {
                    jerk_time: 0.0,
                    const_accel_time: 0.0,
                    peak_velocity: 0.0,
                },
                cruise_time: 0.0,
                total_time: 0.0,
                segments: Vec::new(),
            };
        }

        let full = Ramp::to_velocity(limits.max_velocity, &limits);
        let (ramp, cruise_time) = if d >= 2.0 * full.distance() {
            (full, (d - 2.0 * full.distance()) / limits.max_velocity)
        } else {
            (Ramp::to_velocity(reduced_peak_velocity(d, &limits), &limits), 0.0)
        };

        let j = limits.max_jerk;
        let plan = [
            (ramp.jerk_time, j),
            (ramp.const_accel_time, 0.0),
            (ramp.jerk_time, -j),
            (cruise_time, 0.0),
            (ramp.jerk_time, -j),
            (ramp.const_accel_time, 0.0),
            (ramp.jerk_time, j),
        ];

        let mut segments = Vec::with_capacity(plan.len());
        let (mut start, mut p, mut v, mut a) = (0.0, 0.0, 0.0, 0.0);
        for (duration, jerk) in plan {
            let segment = Segment {
                start,
                duration,
                jerk,
                p0: p,
                v0: v,
                a0: a,
            };
            (p, v, a) = segment.state_at(duration);
            start += duration;
            segments.push(segment);
        }

        Self {
            distance: d,
            sign,
            limits,
            ramp,
            cruise_time,
            total_time: start,
            segments,
        }
    }

    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// Unsigned trip length.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn peak_velocity(&self) -> f64 {
        self.ramp.peak_velocity
    }

    /// Whether the trip reaches rated speed and cruises.
    pub fn reaches_max_velocity(&self) -> bool {
        self.distance > 0.0 && self.ramp.peak_velocity >= self.limits.max_velocity - EPS
    }

    /// Elapsed time at which the braking half of the profile starts.
    pub fn deceleration_start(&self) -> f64 {
        if self.distance <= 0.0 {
            return 0.0;
        }
        self.ramp.duration() + self.cruise_time
    }

    /// Signed (position, velocity, acceleration) at elapsed time `t`.
    pub fn state_at(&self, t: f64) -> (f64, f64, f64) {
        if self.segments.is_empty() || t <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        if t >= self.total_time {
            return (self.sign * self.distance, 0.0, 0.0);
        }
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.start <= t)
            .unwrap_or(&self.segments[0]);
        let (p, v, a) = segment.state_at(t - segment.start);
        (self.sign * p.min(self.distance), self.sign * v, self.sign * a)
    }

    pub fn position_at(&self, t: f64) -> f64 {
        self.state_at(t).0
    }

    pub fn velocity_at(&self, t: f64) -> f64 {
        self.state_at(t).1
    }

    pub fn acceleration_at(&self, t: f64) -> f64 {
        self.state_at(t).2
    }

    /// Elapsed time at which the car has covered `distance` (unsigned) metres.
    pub fn time_to_reach(&self, distance: f64) -> f64 {
        if distance <= 0.0 || self.distance <= 0.0 {
            return 0.0;
        }
        if distance >= self.distance {
            return self.total_time;
        }
        let (mut lo, mut hi) = (0.0, self.total_time);
        for _ in 0..64 {
            let mid = (lo + hi) / 2.0;
            if self.position_at(mid).abs() < distance {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }

    /// Two profiles from the same origin agree at `t` when a car following one
    /// could switch to the other without a jump in position, velocity, or acceleration.
    pub fn agrees_with(&self, other: &SCurveProfile, t: f64) -> bool {
        let (p1, v1, a1) = self.state_at(t);
        let (p2, v2, a2) = other.state_at(t);
        (p1 - p2).abs() <= AGREEMENT_TOLERANCE
            && (v1 - v2).abs() <= AGREEMENT_TOLERANCE
            && (a1 - a2).abs() <= AGREEMENT_TOLERANCE
    }
}

/// Peak velocity of a profile too short to reach rated speed.
fn reduced_peak_velocity(d: f64, limits: &MotionLimits) -> f64 {
    let a = limits.max_acceleration;
    let j = limits.max_jerk;
    let ratio = a / j;
    let with_const_accel = (-ratio + (ratio * ratio + 4.0 * d / a).sqrt()) * a / 2.0;
    if with_const_accel * j >= a * a {
        return with_const_accel;
    }
    let jerk_time = (d / (2.0 * j)).cbrt();
    j * jerk_time * jerk_time
}
