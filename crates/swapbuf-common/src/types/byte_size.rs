//! Human readable byte sizes.
//!
//! Policy parameters such as `barrier = "100MB"` or `min_free_mem = "512 MiB"`
//! are written by people, so they go through [`ByteSize`]:
//!
//! | Unit | Factor |
//! | ---- | ------ |
//! | (none), `B` | 1 |
//! | `KB`, `MB`, `GB`, `TB` | powers of 1000 |
//! | `KiB`, `MiB`, `GiB`, `TiB` | powers of 1024 |
//! | `K`, `M`, `G`, `T` | powers of 1024 |
//!
//! Units are case-insensitive. Negative values are rejected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<value>[0-9]+(?:\.[0-9]+)?)\s*(?P<unit>[A-Za-z]*)\s*$")
        .expect("byte size pattern is valid")
});

const KIB: u64 = 1024;

/// Error returned when a byte size string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteSizeError {
    /// The input is empty or not of the form `<number><unit>`.
    #[error("invalid byte size: {0:?}")]
    Invalid(String),
    /// The unit is not recognized.
    #[error("unknown byte size unit: {0:?}")]
    UnknownUnit(String),
    /// The value does not fit in 64 bits.
    #[error("byte size out of range: {0:?}")]
    Overflow(String),
}

/// A number of bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Zero bytes.
    pub const ZERO: Self = Self(0);

    /// Creates a size from a byte count.
    #[inline]
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Creates a size of `n` KiB.
    #[inline]
    #[must_use]
    pub const fn kib(n: u64) -> Self {
        Self(n * KIB)
    }

    /// Creates a size of `n` MiB.
    #[inline]
    #[must_use]
    pub const fn mib(n: u64) -> Self {
        Self(n * KIB * KIB)
    }

    /// Returns the byte count.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Parses a human readable size.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, negative values, unknown units, or
    /// values that overflow `u64`.
    pub fn parse(input: &str) -> Result<Self, ByteSizeError> {
        let caps = SIZE_PATTERN
            .captures(input)
            .ok_or_else(|| ByteSizeError::Invalid(input.to_string()))?;

        let value = &caps["value"];
        let factor = unit_factor(&caps["unit"])
            .ok_or_else(|| ByteSizeError::UnknownUnit(caps["unit"].to_string()))?;

        if let Ok(whole) = value.parse::<u64>() {
            return whole
                .checked_mul(factor)
                .map(Self)
                .ok_or_else(|| ByteSizeError::Overflow(input.to_string()));
        }

        let fractional: f64 = value
            .parse()
            .map_err(|_| ByteSizeError::Invalid(input.to_string()))?;
        let bytes = (fractional * factor as f64).round();
        if !bytes.is_finite() || bytes >= u64::MAX as f64 {
            return Err(ByteSizeError::Overflow(input.to_string()));
        }
        Ok(Self(bytes as u64))
    }
}

fn unit_factor(unit: &str) -> Option<u64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1000,
        "mb" => 1000_u64.pow(2),
        "gb" => 1000_u64.pow(3),
        "tb" => 1000_u64.pow(4),
        "k" | "kib" => KIB,
        "m" | "mib" => KIB.pow(2),
        "g" | "gib" => KIB.pow(3),
        "t" | "tib" => KIB.pow(4),
        _ => return None,
    };
    Some(factor)
}

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<usize> for ByteSize {
    fn from(bytes: usize) -> Self {
        Self(bytes as u64)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

        if self.0 < KIB {
            return write!(f, "{} B", self.0);
        }

        let mut value = self.0 as f64 / KIB as f64;
        let mut unit = 0;
        while value >= KIB as f64 && unit < UNITS.len() - 1 {
            value /= KIB as f64;
            unit += 1;
        }
        write!(f, "{:.2} {}", value, UNITS[unit])
    }
}
