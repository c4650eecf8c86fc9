//! Reindexing onto a regular grid with explicit gaps.

use chrono::{FixedOffset, NaiveDateTime};
use demand_ingestor::errors::SeriesError;
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::resolution::Resolution;
use demand_ingestor::models::time_index::TimeIndex;
use tracing::warn;

/// Insert a `None` row at every grid position `first + k * step` (up to the
/// last stamp) that has no observation. Existing rows are kept as they are,
/// on-grid or not. Inserted aware stamps take the offset of the preceding row.
///
/// Returns the reindexed series and the number of rows added.
pub fn add_missing_time_steps(
    series: &CanonicalSeries,
    step: Resolution,
) -> Result<(CanonicalSeries, usize), SeriesError> {
    let axis = series.index().axis();
    let Some(&first) = axis.first() else {
        return Ok((series.clone(), 0));
    };
    let step = step.as_timedelta();

    let offsets: Option<Vec<FixedOffset>> = match series.index() {
        TimeIndex::Aware(v) => Some(v.iter().map(|t| *t.offset()).collect()),
        TimeIndex::Naive(_) => None,
    };

    let mut stamps: Vec<(NaiveDateTime, Option<usize>)> = Vec::with_capacity(axis.len());
    let mut grid = first;
    for (row, &t) in axis.iter().enumerate() {
        while grid < t {
            stamps.push((grid, None));
            grid += step;
        }
        if grid == t {
            grid += step;
        }
        stamps.push((t, Some(row)));
    }

    let added = stamps.len() - axis.len();
    if added == 0 {
        return Ok((series.clone(), 0));
    }

    let values = stamps
        .iter()
        .map(|(_, row)| row.and_then(|r| series.values()[r]))
        .collect();
    let index = match offsets {
        None => TimeIndex::Naive(stamps.iter().map(|(t, _)| *t).collect()),
        Some(offsets) => {
            let mut current = offsets[0];
            TimeIndex::Aware(
                stamps
                    .iter()
                    .map(|(t, row)| {
                        if let Some(r) = row {
                            current = offsets[*r];
                        }
                        t.and_utc().with_timezone(&current)
                    })
                    .collect(),
            )
        }
    };

    warn!(
        added,
        expected = stamps.len(),
        step = %Resolution::hours_label(step),
        "Added {} missing time steps out of {}.",
        added,
        stamps.len()
    );
    Ok((CanonicalSeries::new(index, values)?, added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn fills_hourly_holes_with_gaps() {
        let s = CanonicalSeries::naive(vec![at(0, 0), at(3, 0)], vec![Some(1.0), Some(4.0)])
            .unwrap();
        let (out, added) = add_missing_time_steps(&s, Resolution::default()).unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            out.index(),
            &TimeIndex::Naive(vec![at(0, 0), at(1, 0), at(2, 0), at(3, 0)])
        );
        assert_eq!(out.values(), &[Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn complete_series_is_unchanged() {
        let s = CanonicalSeries::naive(vec![at(0, 0), at(1, 0)], vec![None, Some(2.0)]).unwrap();
        let (out, added) = add_missing_time_steps(&s, Resolution::default()).unwrap();
        assert_eq!(added, 0);
        assert_eq!(out, s);
    }

    #[test]
    fn off_grid_rows_are_kept() {
        let s = CanonicalSeries::naive(
            vec![at(0, 0), at(1, 30), at(2, 0)],
            vec![Some(1.0), Some(2.0), Some(3.0)],
        )
        .unwrap();
        let (out, added) = add_missing_time_steps(&s, Resolution::default()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            out.index(),
            &TimeIndex::Naive(vec![at(0, 0), at(1, 0), at(1, 30), at(2, 0)])
        );
    }

    #[test]
    fn inserted_aware_stamps_use_preceding_offset() {
        let stamps = ["2024-01-01T00:00:00+01:00", "2024-01-01T02:00:00+01:00"]
            .iter()
            .map(|s| DateTime::parse_from_rfc3339(s).unwrap())
            .collect();
        let s = CanonicalSeries::aware(stamps, vec![Some(1.0), Some(3.0)]).unwrap();
        let (out, added) = add_missing_time_steps(&s, Resolution::default()).unwrap();
        assert_eq!(added, 1);
        let TimeIndex::Aware(idx) = out.index() else {
            panic!("expected aware index");
        };
        assert_eq!(idx[1].to_rfc3339(), "2024-01-01T01:00:00+01:00");
    }
}
