//! Media timeline positions expressed in 100-nanosecond ticks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::time::Duration;

/// Number of ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// A position or distance on the media timeline.
///
/// Positions reported by media servers are tick based, so the whole
/// orchestration core works in ticks and only converts to [`Duration`] for
/// logging and timers.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Ticks(pub i64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub const fn new(ticks: i64) -> Self {
        Ticks(ticks)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Ticks(secs.saturating_mul(TICKS_PER_SECOND))
    }

    pub const fn from_millis(millis: i64) -> Self {
        Ticks(millis.saturating_mul(TICKS_PER_SECOND / 1_000))
    }

    pub fn from_duration(duration: Duration) -> Self {
        let ticks = duration.as_nanos() / NANOS_PER_TICK as u128;
        Ticks(i64::try_from(ticks).unwrap_or(i64::MAX))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Absolute distance between two positions.
    pub fn distance(self, other: Ticks) -> Ticks {
        Ticks(self.0.saturating_sub(other.0).saturating_abs())
    }

    pub fn abs(self) -> Ticks {
        Ticks(self.0.saturating_abs())
    }

    pub fn clamp_non_negative(self) -> Ticks {
        Ticks(self.0.max(0))
    }

    pub fn saturating_add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_sub(rhs.0))
    }

    /// Negative positions map to [`Duration::ZERO`].
    pub fn as_duration(self) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.0 as u64).saturating_mul(NANOS_PER_TICK as u64))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        self.saturating_add(rhs)
    }
}

impl Sub for Ticks {
    type Output = Ticks;

    fn sub(self, rhs: Ticks) -> Ticks {
        self.saturating_sub(rhs)
    }
}

impl Neg for Ticks {
    type Output = Ticks;

    fn neg(self) -> Ticks {
        Ticks(self.0.saturating_neg())
    }
}

impl From<i64> for Ticks {
    fn from(value: i64) -> Self {
        Ticks(value)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks ({:.3}s)", self.0, self.as_secs_f64())
    }
}
