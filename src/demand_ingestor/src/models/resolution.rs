//! Sampling resolution of a demand series.
//!
//! A [`Resolution`] pairs a non-zero amount with a [`ResolutionUnit`]. It is the
//! typed form of the short strings used in configuration and logs
//! (`"30s"`, `"15min"`, `"1h"`, `"1D"`):
//!
//! ```
//! use demand_ingestor::models::resolution::{Resolution, ResolutionUnit};
//!
//! let r: Resolution = "30min".parse().unwrap();
//! assert_eq!(r.unit(), ResolutionUnit::Minute);
//! assert_eq!(r.to_string(), "30min");
//! assert_eq!(Resolution::default().to_string(), "1h");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of seconds in a minute.
pub const SECS_PER_MINUTE: i64 = 60;
/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("empty resolution")]
    Empty,

    #[error("invalid amount in resolution '{input}'")]
    InvalidAmount { input: String },

    #[error("unknown resolution unit '{unit}'")]
    UnknownUnit { unit: String },
}

/// Resolution granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl ResolutionUnit {
    const fn seconds(self) -> i64 {
        match self {
            ResolutionUnit::Second => 1,
            ResolutionUnit::Minute => SECS_PER_MINUTE,
            ResolutionUnit::Hour => SECS_PER_HOUR,
            ResolutionUnit::Day => SECS_PER_DAY,
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            ResolutionUnit::Second => "s",
            ResolutionUnit::Minute => "min",
            ResolutionUnit::Hour => "h",
            ResolutionUnit::Day => "D",
        }
    }
}

/// A resolution = amount × unit (e.g., 15-Minute, 1-Hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    amount: NonZeroU32,
    unit: ResolutionUnit,
}

const ONE: NonZeroU32 = match NonZeroU32::new(1) {
    Some(nz) => nz,
    None => unreachable!(),
};

impl Default for Resolution {
    /// One hour, the canonical target of every harmonized series.
    fn default() -> Self {
        Self::new(ONE, ResolutionUnit::Hour)
    }
}

impl Resolution {
    pub const fn new(amount: NonZeroU32, unit: ResolutionUnit) -> Self {
        Self { amount, unit }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> ResolutionUnit {
        self.unit
    }

    /// Width of one step in seconds.
    pub const fn seconds(&self) -> i64 {
        self.amount.get() as i64 * self.unit.seconds()
    }

    pub fn as_timedelta(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }

    /// Render an observed gap as fractional hours, e.g. `0.5h` for 30 minutes.
    pub fn hours_label(gap: TimeDelta) -> String {
        let hours = gap.num_milliseconds() as f64 / (SECS_PER_HOUR * 1000) as f64;
        format!("{hours}h")
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount.get(), self.unit.suffix())
    }
}

impl FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // small parser: 30s / 15min / 1h / 1D
        let s = s.trim();
        if s.is_empty() {
            return Err(ResolutionError::Empty);
        }
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        let amount = if digits.is_empty() {
            // pandas-style "h" means "1h"
            ONE
        } else {
            digits
                .parse::<u32>()
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| ResolutionError::InvalidAmount {
                    input: s.to_string(),
                })?
        };

        let unit = match unit {
            "s" => ResolutionUnit::Second,
            "min" | "T" => ResolutionUnit::Minute,
            "h" | "H" => ResolutionUnit::Hour,
            "D" | "d" => ResolutionUnit::Day,
            other => {
                return Err(ResolutionError::UnknownUnit {
                    unit: other.to_string(),
                });
            }
        };
        Ok(Resolution::new(amount, unit))
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
