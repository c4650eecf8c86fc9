//! The single normalization entry point.
//!
//! Every raw series produced by a source adapter goes through [`normalize`] (or
//! [`normalize_with_report`]) before it is considered canonical:
//! 1. the index is typed (textual stamps are parsed, non-timestamps rejected),
//! 2. rows are stably sorted ascending,
//! 3. duplicate stamps are dropped keeping the first occurrence (ties are not averaged),
//! 4. the series is downsampled to the target resolution when finer,
//! 5. missing values are kept as explicit gaps.
//!
//! Applying it to an already canonical series is a no-op.

use std::fmt;

use demand_ingestor::errors::SeriesError;
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::raw_series::RawSeries;
use demand_ingestor::models::resolution::Resolution;
use thiserror::Error;
use tracing::{debug, warn};

use crate::resample::{ResampleEvent, resample_time_resolution};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    /// The raw series is malformed (non-timestamp index, length mismatch).
    #[error("invalid raw series: {0}")]
    Invalid(#[from] SeriesError),
}

/// Something normalization changed that callers may want to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationWarning {
    DuplicatesDropped { count: usize },
    Resampled(ResampleEvent),
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationWarning::DuplicatesDropped { count } => {
                write!(f, "dropped {count} duplicated time steps")
            }
            NormalizationWarning::Resampled(event) => write!(f, "resampled {event}"),
        }
    }
}

/// Summary of what [`normalize_with_report`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Rows removed because their stamp was already present.
    pub duplicates_dropped: usize,
    /// The downsampling step, if one happened.
    pub resample: Option<ResampleEvent>,
    /// Explicit gaps left in the output.
    pub missing_values: usize,
    /// Every warning emitted, in order.
    pub warnings: Vec<NormalizationWarning>,
}

impl NormalizationReport {
    pub fn resample_warnings(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, NormalizationWarning::Resampled(_)))
            .count()
    }
}

/// Normalize a raw series into a canonical one at `target` resolution.
pub fn normalize(raw: RawSeries, target: Resolution) -> Result<CanonicalSeries, NormalizeError> {
    normalize_with_report(raw, target).map(|(series, _)| series)
}

/// Like [`normalize`] but also returns a [`NormalizationReport`].
///
/// Errors:
/// - index and values differ in length
/// - an index entry is not a timestamp
pub fn normalize_with_report(
    raw: RawSeries,
    target: Resolution,
) -> Result<(CanonicalSeries, NormalizationReport), NormalizeError> {
    let mut report = NormalizationReport::default();
    let rows_in = raw.len();
    let (index, values) = raw.into_typed()?;

    // stable sort keeps the original order among equal stamps
    let axis = index.axis();
    let mut order: Vec<usize> = (0..axis.len()).collect();
    order.sort_by_key(|&i| axis[i]);

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        match kept.last() {
            Some(&last) if axis[last] == axis[i] => report.duplicates_dropped += 1,
            _ => kept.push(i),
        }
    }

    if report.duplicates_dropped > 0 {
        warn!(
            duplicates = report.duplicates_dropped,
            rows = rows_in,
            "There are {} duplicated time steps in the time series; keeping the first occurrence.",
            report.duplicates_dropped
        );
        report.warnings.push(NormalizationWarning::DuplicatesDropped {
            count: report.duplicates_dropped,
        });
    }

    let values = kept.iter().map(|&i| values[i]).collect();
    let series = CanonicalSeries::new(index.select(&kept), values)?;

    let (series, event) = resample_time_resolution(series, target)?;
    if let Some(event) = event {
        report.resample = Some(event);
        report.warnings.push(NormalizationWarning::Resampled(event));
    }

    report.missing_values = series.missing_values();
    debug!(
        rows_in,
        rows_out = series.len(),
        missing = report.missing_values,
        target = %target,
        "normalized series"
    );
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use demand_ingestor::models::raw_series::RawIndex;
    use demand_ingestor::models::time_index::TimeIndex;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn sorts_and_keeps_first_duplicate() {
        let raw = RawSeries::new(
            RawIndex::Naive(vec![at(2, 0), at(0, 0), at(2, 0), at(1, 0)]),
            vec![Some(2.0), Some(0.0), Some(99.0), None],
        );
        let (s, report) = normalize_with_report(raw, Resolution::default()).unwrap();
        assert_eq!(s.index(), &TimeIndex::Naive(vec![at(0, 0), at(1, 0), at(2, 0)]));
        assert_eq!(s.values(), &[Some(0.0), None, Some(2.0)]);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(report.missing_values, 1);
        assert_eq!(
            report.warnings,
            vec![NormalizationWarning::DuplicatesDropped { count: 1 }]
        );
    }

    #[test]
    fn resampling_is_reported_once() {
        let raw = RawSeries::from_f64(
            RawIndex::Naive(vec![at(0, 0), at(0, 30), at(1, 0), at(1, 30)]),
            [10.0, 20.0, 30.0, 40.0],
        );
        let (s, report) = normalize_with_report(raw, Resolution::default()).unwrap();
        assert_eq!(s.values(), &[Some(15.0), Some(35.0)]);
        assert_eq!(report.resample_warnings(), 1);
        assert_eq!(
            report.resample.map(|e| e.to_string()).as_deref(),
            Some("0.5h → 1h")
        );
    }

    #[test]
    fn non_timestamp_index_fails_up_front() {
        let raw = RawSeries::new(
            RawIndex::Labels(vec!["2024-01-01 00:00".into(), "total".into()]),
            vec![Some(1.0), Some(2.0)],
        );
        assert!(matches!(
            normalize(raw, Resolution::default()),
            Err(NormalizeError::Invalid(SeriesError::NonTimestampIndex { position: 1, .. }))
        ));
    }

    #[test]
    fn empty_series_normalizes_to_empty() {
        let raw = RawSeries::new(RawIndex::Naive(vec![]), vec![]);
        let s = normalize(raw, Resolution::default()).unwrap();
        assert!(s.is_empty());
    }
}
