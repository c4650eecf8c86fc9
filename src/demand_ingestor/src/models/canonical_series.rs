//! Canonical in-memory representation of a harmonized demand series.
//!
//! A [`CanonicalSeries`] has a strictly increasing, duplicate-free index and one
//! optional value per row. Missing observations stay as explicit `None` gaps.
//! The type is immutable once built: fields are private and every transform
//! produces a new series.

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::errors::SeriesError;
use crate::models::time_index::{TimeIndex, TimezoneState};

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSeries {
    index: TimeIndex,
    values: Vec<Option<f64>>,
}

impl CanonicalSeries {
    /// Build a series, checking lengths and strict monotonicity.
    pub fn new(index: TimeIndex, values: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if index.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                index: index.len(),
                values: values.len(),
            });
        }
        let axis = index.axis();
        if let Some(position) = axis.windows(2).position(|w| w[0] >= w[1]) {
            return Err(SeriesError::NotStrictlyIncreasing {
                position: position + 1,
                at: axis[position + 1],
            });
        }
        Ok(Self { index, values })
    }

    pub fn naive(
        stamps: Vec<NaiveDateTime>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        Self::new(TimeIndex::Naive(stamps), values)
    }

    pub fn aware(
        stamps: Vec<DateTime<FixedOffset>>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        Self::new(TimeIndex::Aware(stamps), values)
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn timezone_state(&self) -> TimezoneState {
        self.index.timezone_state()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of explicit gaps.
    pub fn missing_values(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn into_parts(self) -> (TimeIndex, Vec<Option<f64>>) {
        (self.index, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn accepts_increasing_index_with_gaps() {
        let s = CanonicalSeries::naive(vec![at(0), at(1), at(3)], vec![Some(1.0), None, Some(2.0)])
            .unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.missing_values(), 1);
        assert_eq!(s.timezone_state(), TimezoneState::Naive);
    }

    #[test]
    fn rejects_duplicates_and_disorder() {
        assert_eq!(
            CanonicalSeries::naive(vec![at(0), at(0)], vec![None, None]).unwrap_err(),
            SeriesError::NotStrictlyIncreasing {
                position: 1,
                at: at(0)
            }
        );
        assert!(CanonicalSeries::naive(vec![at(2), at(1)], vec![None, None]).is_err());
    }

    #[test]
    fn aware_order_uses_instants() {
        // 01:30+01:00 is 00:30Z, which comes before 01:00+00:00.
        let a = DateTime::parse_from_rfc3339("2024-01-01T01:30:00+01:00").unwrap();
        let b = DateTime::parse_from_rfc3339("2024-01-01T01:00:00+00:00").unwrap();
        assert!(CanonicalSeries::aware(vec![a, b], vec![None, None]).is_ok());
        assert!(CanonicalSeries::aware(vec![b, a], vec![None, None]).is_err());
    }
}
