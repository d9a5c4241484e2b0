//! Discrete run-clock keys of the form `minute'decistep`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Decisteps per minute mark. Advancing past the last decistep wraps to the
/// next minute (`0'8` + 2 = `1'0`).
pub const DECISTEPS_PER_MINUTE: u32 = 10;

/// A point on the run clock.
///
/// Keys order lexicographically by `(minute, decistep)` and collapse to the
/// canonical string `minute'decistep` in every persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey {
    pub minute: u32,
    pub decistep: u8,
}

impl TimeKey {
    pub fn new(minute: u32, decistep: u8) -> Self {
        debug_assert!((decistep as u32) < DECISTEPS_PER_MINUTE);
        Self { minute, decistep }
    }

    /// The run origin `0'0`.
    pub fn zero() -> Self {
        Self {
            minute: 0,
            decistep: 0,
        }
    }

    /// Advance by `decisteps`, wrapping into the minute component.
    pub fn advanced(self, decisteps: u8) -> Self {
        let total = self.decistep as u32 + decisteps as u32;
        Self {
            minute: self.minute + total / DECISTEPS_PER_MINUTE,
            decistep: (total % DECISTEPS_PER_MINUTE) as u8,
        }
    }

    /// Scalar clock value (`minute + decistep/10`), comparable with label
    /// time ranges, which use the same unit.
    pub fn value(self) -> f64 {
        self.minute as f64 + self.decistep as f64 / 10.0
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'{}", self.minute, self.decistep)
    }
}

impl FromStr for TimeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (minute, decistep) = s
            .split_once('\'')
            .ok_or_else(|| format!("time key '{s}' is missing the ' separator"))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("time key '{s}' has a non-numeric minute"))?;
        let decistep: u8 = decistep
            .parse()
            .map_err(|_| format!("time key '{s}' has a non-numeric decistep"))?;
        if decistep as u32 >= DECISTEPS_PER_MINUTE {
            return Err(format!("time key '{s}' decistep must be < 10"));
        }
        Ok(Self { minute, decistep })
    }
}

impl Serialize for TimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
