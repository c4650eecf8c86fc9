//! Canonical persistence of harmonized series.
//!
//! [`save`] is the only way a [`CanonicalSeries`] reaches disk. It picks the
//! format from the file extension, asks [`enforce::check`] whether the index can
//! be stored there without losing its time zone, and only then writes. Files
//! are written to a temporary sibling and renamed into place, so a failed save
//! never leaves a readable file behind.
//!
//! [`load`] reverses the process and refuses files whose time zone cannot be
//! established.

pub mod columnar;
pub mod delimited;
pub mod enforce;

use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use demand_ingestor::errors::SeriesError;
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::time_index::{TimeIndex, TimezoneState};
use demand_ingestor::tz::TzError;
use snafu::{Backtrace, ResultExt, Snafu, ensure};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub use enforce::{Format, TimezoneEncoding};

/// Name of the index column in every stored file.
pub const TIME_COLUMN: &str = "time";
/// Per-row UTC offset column of columnar files holding an aware index.
pub const OFFSET_COLUMN: &str = "utc_offset_seconds";
/// Metadata key carrying the IANA zone of a naive columnar index.
pub const REFERENCE_TIMEZONE_KEY: &str = "reference_timezone";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PersistError {
    /// The file extension maps to no known format.
    #[snafu(display("Unsupported file format '.{extension}'"))]
    UnsupportedFormat {
        extension: String,
        backtrace: Backtrace,
    },

    /// The index's time zone cannot be recorded (on save) or recovered (on load).
    #[snafu(display(
        "Ambiguous timezone: a {state} index cannot be stored as {format} without a reference timezone"
    ))]
    AmbiguousTimezone {
        format: Format,
        state: TimezoneState,
        backtrace: Backtrace,
    },

    /// A stored reference timezone is not a known IANA name.
    #[snafu(display("Invalid reference timezone: {source}"))]
    InvalidTimezone {
        source: TzError,
        backtrace: Backtrace,
    },

    /// The variable name would collide with the index column or is empty.
    #[snafu(display("Invalid variable name '{name}'"))]
    InvalidVariableName { name: String, backtrace: Backtrace },

    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("CSV error on {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Parquet error on {}: {source}", path.display()))]
    Parquet {
        path: PathBuf,
        source: parquet::errors::ParquetError,
        backtrace: Backtrace,
    },

    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        source: arrow::error::ArrowError,
        backtrace: Backtrace,
    },

    /// The file is readable but does not have the stored-series layout.
    #[snafu(display("Malformed file {}: {message}", path.display()))]
    Malformed {
        path: PathBuf,
        message: String,
        backtrace: Backtrace,
    },

    /// The stored rows violate the canonical series invariants.
    #[snafu(display("Stored series is not canonical: {source}"))]
    Series {
        source: SeriesError,
        backtrace: Backtrace,
    },
}

impl PersistError {
    /// Rejections decided before any byte is written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PersistError::UnsupportedFormat { .. }
                | PersistError::AmbiguousTimezone { .. }
                | PersistError::InvalidVariableName { .. }
        )
    }
}

/// A series read back from disk with what was stored alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    pub series: CanonicalSeries,
    pub variable_name: String,
    /// Only set for naive columnar files.
    pub reference_timezone: Option<Tz>,
}

/// Write `series` to `path` under the column name `variable_name`.
///
/// `reference_timezone` is the zone naive stamps are expressed in; aware
/// series ignore it.
pub fn save(
    series: &CanonicalSeries,
    path: &Path,
    variable_name: &str,
    reference_timezone: Option<Tz>,
) -> Result<(), PersistError> {
    let (format, encoding) = admit(series, path, variable_name, reference_timezone)
        .inspect_err(|e| match Format::from_path(path) {
            Ok(format) => warn!(
                path = %path.display(),
                %format,
                timezone_state = %series.timezone_state(),
                error = %e,
                "refusing to save series"
            ),
            Err(_) => warn!(
                path = %path.display(),
                timezone_state = %series.timezone_state(),
                error = %e,
                "refusing to save series"
            ),
        })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).context(IoSnafu { path: dir })?;
    let mut tmp = NamedTempFile::new_in(dir).context(IoSnafu { path: dir })?;

    match (format, series.index()) {
        (Format::Delimited, TimeIndex::Aware(stamps)) => {
            delimited::write(tmp.as_file_mut(), path, stamps, series.values(), variable_name)?
        }
        (Format::Delimited, TimeIndex::Naive(_)) => {
            return AmbiguousTimezoneSnafu {
                format,
                state: TimezoneState::Naive,
            }
            .fail();
        }
        (Format::Columnar, _) => {
            columnar::write(tmp.as_file_mut(), path, series, variable_name, encoding)?
        }
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .context(IoSnafu { path })?;
    info!(
        path = %path.display(),
        %format,
        rows = series.len(),
        missing = series.missing_values(),
        "saved series"
    );
    Ok(())
}

fn admit(
    series: &CanonicalSeries,
    path: &Path,
    variable_name: &str,
    reference_timezone: Option<Tz>,
) -> Result<(Format, TimezoneEncoding), PersistError> {
    let format = Format::from_path(path)?;
    let reserved = variable_name == TIME_COLUMN
        || (format == Format::Columnar && variable_name == OFFSET_COLUMN);
    ensure!(
        !variable_name.trim().is_empty() && !reserved,
        InvalidVariableNameSnafu {
            name: variable_name
        }
    );
    let encoding = enforce::check(format, series.timezone_state(), reference_timezone)?;
    Ok((format, encoding))
}

/// Read a file written by [`save`].
pub fn load(path: &Path) -> Result<StoredSeries, PersistError> {
    let stored = match Format::from_path(path)? {
        Format::Delimited => delimited::read(path)?,
        Format::Columnar => columnar::read(path)?,
    };
    info!(
        path = %path.display(),
        rows = stored.series.len(),
        variable = %stored.variable_name,
        "loaded series"
    );
    Ok(stored)
}
