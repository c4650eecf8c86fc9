//! Timezone contract: which files may hold which kind of index.
//!
//! | format    | index | reference zone | outcome              |
//! |-----------|-------|----------------|----------------------|
//! | delimited | aware | any            | per-row offsets      |
//! | delimited | naive | any            | rejected (ambiguous) |
//! | columnar  | naive | given          | sidecar attribute    |
//! | columnar  | aware | any            | per-row offsets      |
//! | columnar  | naive | none           | rejected (ambiguous) |

use std::fmt;
use std::path::Path;

use chrono_tz::Tz;
use demand_ingestor::models::time_index::TimezoneState;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AmbiguousTimezoneSnafu, PersistError, UnsupportedFormatSnafu};

/// On-disk format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// `.csv`
    #[serde(rename = "csv")]
    Delimited,
    /// `.parquet`
    #[serde(rename = "parquet")]
    Columnar,
}

impl Format {
    /// Dispatch on the (case-insensitive) extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self, PersistError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Ok(Format::Delimited),
            "parquet" => Ok(Format::Columnar),
            _ => UnsupportedFormatSnafu { extension }.fail(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Delimited => "csv",
            Format::Columnar => "parquet",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Delimited => "delimited",
            Format::Columnar => "columnar",
        })
    }
}

/// How the time zone is carried in an accepted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimezoneEncoding {
    /// Every row carries its own UTC offset.
    PerRowOffset,
    /// Naive wall-clock stamps plus one file-level zone attribute.
    Sidecar(Tz),
}

/// Decide how `state` may be stored in `format`, or reject it.
pub fn check(
    format: Format,
    state: TimezoneState,
    reference: Option<Tz>,
) -> Result<TimezoneEncoding, PersistError> {
    match (format, state, reference) {
        (_, TimezoneState::Aware, reference) => {
            if let Some(tz) = reference {
                debug!(%format, reference = %tz, "aware index; reference timezone ignored");
            }
            Ok(TimezoneEncoding::PerRowOffset)
        }
        (Format::Columnar, TimezoneState::Naive, Some(tz)) => Ok(TimezoneEncoding::Sidecar(tz)),
        (format, TimezoneState::Naive, _) => AmbiguousTimezoneSnafu { format, state }.fail(),
    }
}
