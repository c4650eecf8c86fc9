//! Time zone parsing and localization helpers.
//!
//! What this module provides:
//! - [`parse_time_zone`]: Parse an IANA time zone name (e.g., "America/New_York").
//! - [`localize`]: Attach a time zone to a naive wall-clock timestamp, resolving DST
//!   gaps (spring-forward) and ambiguities (fall-back) via [`DstPolicy`].
//! - [`localize_all`]: Same for a whole index, naming the first row that fails.
//!
//! Notes:
//! - Ambiguous local times happen during "fall back" when a wall time occurs twice.
//! - Nonexistent local times happen during "spring forward" when a wall time is skipped.
//! - Sources that publish local wall-clock values without an offset are localized
//!   by their adapter; the harmonizer itself never guesses a zone.
//!
//! Examples
//! - New York "fall back" ambiguity (2024-11-03 01:30 occurs twice):
//!   PreferEarliest -> 05:30Z, PreferLatest -> 06:30Z.

use chrono::offset::LocalResult;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TzError {
    #[error("bad tz: {0}")]
    UnknownTimeZone(String),

    #[error("ambiguous local time {naive} in {tz}")]
    Ambiguous { naive: NaiveDateTime, tz: Tz },

    #[error("nonexistent local time {naive} in {tz}")]
    Nonexistent { naive: NaiveDateTime, tz: Tz },
}

/// Parse an IANA time zone name.
pub fn parse_time_zone(name: &str) -> Result<Tz, TzError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TzError::UnknownTimeZone(name.to_string()))
}

/// Policy for handling DST edge cases when localizing naive timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Strict behavior: error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    #[default]
    Strict,
    /// For ambiguous local times (two possible instants), pick the earliest instant
    /// (typically the DST occurrence).
    PreferEarliest,
    /// For ambiguous local times (two possible instants), pick the latest instant
    /// (typically the standard-time occurrence).
    PreferLatest,
    /// For nonexistent local times (spring-forward gap), shift forward in one-minute
    /// increments until the first valid instant is found (capped at 2 hours).
    ShiftForward,
}

/// Attach `tz` to a naive local timestamp.
///
/// Behavior:
/// - If the local time maps to a single instant, that instant is returned.
/// - If the local time is ambiguous (fall-back), behavior depends on `policy`:
///   - PreferEarliest -> pick the earlier instant
///   - PreferLatest -> pick the later instant
///   - Strict/ShiftForward -> return an error
/// - If the local time is nonexistent (spring-forward gap), behavior depends on `policy`:
///   - ShiftForward -> step forward minute-by-minute until a valid instant is found (max 2 hours)
///   - Strict/PreferEarliest/PreferLatest -> return an error
pub fn localize(
    naive: NaiveDateTime,
    tz: Tz,
    policy: DstPolicy,
) -> Result<DateTime<FixedOffset>, TzError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        LocalResult::Ambiguous(a, b) => match policy {
            DstPolicy::PreferEarliest => Ok(a.fixed_offset()),
            DstPolicy::PreferLatest => Ok(b.fixed_offset()),
            _ => Err(TzError::Ambiguous { naive, tz }),
        },
        LocalResult::None => match policy {
            DstPolicy::ShiftForward => {
                let mut t = naive;
                for _ in 0..120 {
                    t += TimeDelta::minutes(1);
                    if let LocalResult::Single(dt) = tz.from_local_datetime(&t) {
                        return Ok(dt.fixed_offset());
                    }
                }
                Err(TzError::Nonexistent { naive, tz })
            }
            _ => Err(TzError::Nonexistent { naive, tz }),
        },
    }
}

/// Localize every timestamp of an index.
pub fn localize_all(
    stamps: &[NaiveDateTime],
    tz: Tz,
    policy: DstPolicy,
) -> Result<Vec<DateTime<FixedOffset>>, TzError> {
    stamps.iter().map(|&t| localize(t, tz, policy)).collect()
}
