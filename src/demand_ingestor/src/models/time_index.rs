//! Typed timestamp indices.
//!
//! A series index is either entirely timezone-naive (wall-clock values whose
//! meaning depends on an externally declared reference timezone) or entirely
//! timezone-aware (every row carries its own UTC offset). Mixed indices are not
//! representable.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Whether an index carries explicit UTC offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimezoneState {
    Naive,
    Aware,
}

impl fmt::Display for TimezoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimezoneState::Naive => "naive",
            TimezoneState::Aware => "aware",
        })
    }
}

/// A typed timestamp index.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeIndex {
    Naive(Vec<NaiveDateTime>),
    Aware(Vec<DateTime<FixedOffset>>),
}

impl TimeIndex {
    pub fn len(&self) -> usize {
        match self {
            TimeIndex::Naive(v) => v.len(),
            TimeIndex::Aware(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timezone_state(&self) -> TimezoneState {
        match self {
            TimeIndex::Naive(_) => TimezoneState::Naive,
            TimeIndex::Aware(_) => TimezoneState::Aware,
        }
    }

    /// Position of each row on a common axis: wall-clock for naive indices,
    /// the UTC instant for aware ones. Ordering, duplicate detection and gap
    /// measurement all happen on this axis.
    pub fn axis(&self) -> Vec<NaiveDateTime> {
        match self {
            TimeIndex::Naive(v) => v.clone(),
            TimeIndex::Aware(v) => v.iter().map(|t| t.naive_utc()).collect(),
        }
    }

    /// Keep the rows at `positions`, in that order.
    pub fn select(&self, positions: &[usize]) -> TimeIndex {
        match self {
            TimeIndex::Naive(v) => TimeIndex::Naive(positions.iter().map(|&i| v[i]).collect()),
            TimeIndex::Aware(v) => TimeIndex::Aware(positions.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Naive formats accepted for textual timestamps, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// One parsed textual timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedStamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

/// Parse a textual timestamp: RFC-3339 (with offset) first, then the naive formats.
pub fn parse_stamp(label: &str) -> Option<ParsedStamp> {
    let label = label.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
        return Some(ParsedStamp::Aware(dt));
    }
    // "2024-01-01 00:00:00+01:00" is common in dumps and is not strict RFC-3339.
    if let Ok(dt) = DateTime::parse_from_str(label, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ParsedStamp::Aware(dt));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(label, fmt).ok())
        .map(ParsedStamp::Naive)
}
