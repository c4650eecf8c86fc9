//! Downsampling to a target resolution.
//!
//! - Native resolution = smallest gap between consecutive stamps.
//! - Only finer-than-target series are touched; nothing is ever upsampled.
//! - Windows are fixed-width buckets over Unix seconds: `floor((t + origin) / width)`.
//!   Naive series bucket on the wall clock (origin 0). Aware series bucket on the
//!   UTC instant shifted by the first row's offset, so windows follow local
//!   boundaries even for half-hour zones.
//! - A window's value is the mean of its present values; a window holding only
//!   gaps stays a gap; a window without rows is not emitted.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Timelike};
use demand_ingestor::errors::SeriesError;
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::resolution::Resolution;
use demand_ingestor::models::time_index::TimeIndex;
use tracing::warn;

/// One downsampling action, from the observed native gap to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleEvent {
    pub from: TimeDelta,
    pub to: Resolution,
}

impl fmt::Display for ResampleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", Resolution::hours_label(self.from), self.to)
    }
}

/// Smallest gap between consecutive stamps, `None` below two rows.
///
/// Assumes a sorted index; on the UTC axis for aware indices.
pub fn native_resolution(index: &TimeIndex) -> Option<TimeDelta> {
    index
        .axis()
        .windows(2)
        .map(|w| w[1] - w[0])
        .min()
}

/// Downsample `series` to `target` by window mean when its native resolution is finer.
///
/// Returns the (possibly unchanged) series and the resampling event, if any.
pub fn resample_time_resolution(
    series: CanonicalSeries,
    target: Resolution,
) -> Result<(CanonicalSeries, Option<ResampleEvent>), SeriesError> {
    let native = match native_resolution(series.index()) {
        Some(native) if native < target.as_timedelta() => native,
        _ => return Ok((series, None)),
    };

    let width = target.seconds();
    let (index, values) = series.into_parts();
    let axis = index.axis();
    let origin = match &index {
        TimeIndex::Aware(v) => i64::from(v[0].offset().local_minus_utc()),
        TimeIndex::Naive(_) => 0,
    };

    let mut windows: Vec<Window> = Vec::new();
    for (row, (t, v)) in axis.iter().zip(&values).enumerate() {
        let key = t.and_utc().timestamp() + origin;
        let bucket = key.div_euclid(width);
        match windows.last_mut() {
            Some(w) if w.bucket == bucket => w.push(*v),
            _ => {
                let start = window_start(*t, key.rem_euclid(width));
                windows.push(Window::new(bucket, start, row, *v));
            }
        }
    }

    let values = windows.iter().map(Window::mean).collect();
    let index = match &index {
        TimeIndex::Naive(_) => TimeIndex::Naive(windows.iter().map(|w| w.start).collect()),
        TimeIndex::Aware(stamps) => TimeIndex::Aware(
            windows
                .iter()
                .map(|w| in_offset(w.start, *stamps[w.first_row].offset()))
                .collect(),
        ),
    };
    let resampled = CanonicalSeries::new(index, values)?;

    let event = ResampleEvent { from: native, to: target };
    warn!(
        from = %Resolution::hours_label(native),
        to = %target,
        rows_before = axis.len(),
        rows_after = resampled.len(),
        "Resampled the time series from {} to {}.",
        Resolution::hours_label(native),
        target
    );
    Ok((resampled, Some(event)))
}

struct Window {
    bucket: i64,
    start: NaiveDateTime,
    first_row: usize,
    sum: f64,
    present: usize,
}

impl Window {
    fn new(bucket: i64, start: NaiveDateTime, first_row: usize, v: Option<f64>) -> Self {
        let mut w = Window {
            bucket,
            start,
            first_row,
            sum: 0.0,
            present: 0,
        };
        w.push(v);
        w
    }

    fn push(&mut self, v: Option<f64>) {
        if let Some(x) = v {
            self.sum += x;
            self.present += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.present > 0).then(|| self.sum / self.present as f64)
    }
}

// Start of the window containing `t`, given `t`'s whole-second remainder into it.
fn window_start(t: NaiveDateTime, rem_secs: i64) -> NaiveDateTime {
    t - TimeDelta::seconds(rem_secs) - TimeDelta::nanoseconds(i64::from(t.nanosecond()))
}

fn in_offset(utc_axis: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    utc_axis.and_utc().with_timezone(&offset)
}

// -------------------- tests --------------------
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn hourly() -> Resolution {
        Resolution::default()
    }

    #[test]
    fn half_hourly_means_per_hour() {
        let s = CanonicalSeries::naive(
            vec![at(0, 0), at(0, 30), at(1, 0), at(1, 30)],
            vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)],
        )
        .unwrap();
        let (out, event) = resample_time_resolution(s, hourly()).unwrap();
        assert_eq!(out.values(), &[Some(15.0), Some(35.0)]);
        assert_eq!(out.index(), &TimeIndex::Naive(vec![at(0, 0), at(1, 0)]));
        assert_eq!(event.unwrap().to_string(), "0.5h → 1h");
    }

    #[test]
    fn empty_windows_are_absent_and_gap_windows_stay_gaps() {
        let s = CanonicalSeries::naive(
            vec![at(0, 0), at(0, 30), at(3, 0), at(3, 30)],
            vec![Some(1.0), Some(3.0), None, None],
        )
        .unwrap();
        let (out, _) = resample_time_resolution(s, hourly()).unwrap();
        assert_eq!(out.index(), &TimeIndex::Naive(vec![at(0, 0), at(3, 0)]));
        assert_eq!(out.values(), &[Some(2.0), None]);
    }

    #[test]
    fn partial_gaps_average_present_values() {
        let s = CanonicalSeries::naive(
            vec![at(0, 0), at(0, 15), at(0, 30), at(0, 45)],
            vec![Some(4.0), None, Some(8.0), None],
        )
        .unwrap();
        let (out, event) = resample_time_resolution(s, hourly()).unwrap();
        assert_eq!(out.values(), &[Some(6.0)]);
        assert_eq!(event.unwrap().from, TimeDelta::minutes(15));
    }

    #[test]
    fn coarser_or_equal_is_untouched() {
        let s = CanonicalSeries::naive(vec![at(0, 0), at(1, 0)], vec![Some(1.0), Some(2.0)])
            .unwrap();
        let (out, event) = resample_time_resolution(s.clone(), hourly()).unwrap();
        assert_eq!(out, s);
        assert!(event.is_none());
    }

    #[test]
    fn single_observation_is_untouched() {
        let s = CanonicalSeries::naive(vec![at(0, 10)], vec![Some(1.0)]).unwrap();
        assert_eq!(native_resolution(s.index()), None);
        let (out, event) = resample_time_resolution(s.clone(), hourly()).unwrap();
        assert_eq!(out, s);
        assert!(event.is_none());
    }

    #[test]
    fn aware_windows_follow_local_half_hour_offset() {
        // Asia/Kolkata is +05:30: local hours start at :30 UTC.
        let stamps: Vec<_> = ["10:00", "10:30", "11:00"]
            .iter()
            .map(|hm| DateTime::parse_from_rfc3339(&format!("2024-01-01T{hm}:00+05:30")).unwrap())
            .collect();
        let s = CanonicalSeries::aware(stamps, vec![Some(1.0), Some(3.0), Some(7.0)]).unwrap();
        let (out, _) = resample_time_resolution(s, hourly()).unwrap();

        let TimeIndex::Aware(idx) = out.index() else {
            panic!("expected aware index");
        };
        assert_eq!(idx[0].to_rfc3339(), "2024-01-01T10:00:00+05:30");
        assert_eq!(idx[1].to_rfc3339(), "2024-01-01T11:00:00+05:30");
        assert_eq!(out.values(), &[Some(2.0), Some(7.0)]);
    }
}
