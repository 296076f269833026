//! Simulation time
//!
//! Combat is simulated in continuous time with integer nanosecond resolution.
//! A single type serves as both an instant (time since combat start) and a span
//! (durations, lags, delays), so arithmetic between the two never needs conversion.
//!
//! Integer storage keeps long iterations (tens of minutes) free of accumulated
//! floating-point drift, and makes event ordering exact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Nanoseconds per second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds per millisecond
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Simulation timestamp or duration, stored as signed nanoseconds
///
/// Serialized as floating-point seconds so configuration files stay readable.
///
/// # Example
/// ```
/// use combat_simulator_core_rs::SimTime;
///
/// let cast = SimTime::from_secs_f64(1.5);
/// let gcd = SimTime::from_millis(1500);
/// assert_eq!(cast, gcd);
/// assert_eq!((cast + gcd).as_secs_f64(), 3.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(i64);

impl SimTime {
    /// Zero time (combat start / empty duration)
    pub const ZERO: SimTime = SimTime(0);

    /// Largest representable time, used for "never" / permanent durations
    pub const MAX: SimTime = SimTime(i64::MAX);

    /// Smallest representable time
    pub const MIN: SimTime = SimTime(i64::MIN);

    /// Create from raw nanoseconds
    pub const fn from_nanos(nanos: i64) -> Self {
        SimTime(nanos)
    }

    /// Create from whole milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        SimTime(millis * NANOS_PER_MILLI)
    }

    /// Create from whole seconds
    pub const fn from_secs(secs: i64) -> Self {
        SimTime(secs * NANOS_PER_SECOND)
    }

    /// Create from fractional seconds, rounded to the nearest nanosecond
    ///
    /// Non-finite input saturates: NaN maps to zero, infinities to MIN/MAX.
    ///
    /// # Example
    /// ```
    /// use combat_simulator_core_rs::SimTime;
    ///
    /// assert_eq!(SimTime::from_secs_f64(0.25).as_nanos(), 250_000_000);
    /// ```
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() {
            return SimTime::ZERO;
        }
        let nanos = (secs * NANOS_PER_SECOND as f64).round();
        if nanos >= i64::MAX as f64 {
            SimTime::MAX
        } else if nanos <= i64::MIN as f64 {
            SimTime::MIN
        } else {
            SimTime(nanos as i64)
        }
    }

    /// Raw nanoseconds
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Fractional seconds
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    /// Fractional milliseconds
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_MILLI as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Clamp negative values to zero
    ///
    /// # Example
    /// ```
    /// use combat_simulator_core_rs::SimTime;
    ///
    /// let remains = SimTime::from_secs(2) - SimTime::from_secs(5);
    /// assert_eq!(remains.clamp_non_negative(), SimTime::ZERO);
    /// ```
    pub fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            SimTime::ZERO
        } else {
            self
        }
    }

    pub fn saturating_add(self, other: SimTime) -> Self {
        SimTime(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: SimTime) -> Self {
        SimTime(self.0.saturating_sub(other.0))
    }

    /// Scale by an integer factor (e.g. tick count × tick interval)
    pub fn times(self, factor: i64) -> Self {
        SimTime(self.0.saturating_mul(factor))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for SimTime {
    fn sub_assign(&mut self, rhs: SimTime) {
        *self = *self - rhs;
    }
}

impl Neg for SimTime {
    type Output = SimTime;

    fn neg(self) -> SimTime {
        SimTime(self.0.saturating_neg())
    }
}

impl Mul<f64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: f64) -> SimTime {
        SimTime::from_secs_f64(self.as_secs_f64() * rhs)
    }
}

impl Div<f64> for SimTime {
    type Output = SimTime;

    fn div(self, rhs: f64) -> SimTime {
        SimTime::from_secs_f64(self.as_secs_f64() / rhs)
    }
}

/// Ratio of two spans
impl Div<SimTime> for SimTime {
    type Output = f64;

    fn div(self, rhs: SimTime) -> f64 {
        self.0 as f64 / rhs.0 as f64
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom(format!(
                "time must be a finite number of seconds, got {}",
                secs
            )));
        }
        Ok(SimTime::from_secs_f64(secs))
    }
}
