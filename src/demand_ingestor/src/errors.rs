use chrono::NaiveDateTime;
use thiserror::Error;

/// Violations of the data contract of a raw or canonical series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    /// Index and values have a different number of rows.
    #[error("index has {index} rows but values has {values}")]
    LengthMismatch { index: usize, values: usize },

    /// A textual index entry is not a timestamp, or naive and aware entries are mixed.
    #[error("index entry {position} is not a usable timestamp: '{label}'")]
    NonTimestampIndex { position: usize, label: String },

    /// The index is not strictly increasing (on the UTC axis for aware indices).
    #[error("index is not strictly increasing at position {position} ({at})")]
    NotStrictlyIncreasing { position: usize, at: NaiveDateTime },
}
