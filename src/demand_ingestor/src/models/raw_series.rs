//! Untrusted output of a source adapter.
//!
//! A [`RawSeries`] is whatever an adapter managed to scrape: the index may be
//! unsorted, carry duplicates, be naive or aware, or even still be text. Nothing
//! is guaranteed until the series has been normalized into a
//! [`CanonicalSeries`](crate::models::canonical_series::CanonicalSeries).

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::errors::SeriesError;
use crate::models::canonical_series::CanonicalSeries;
use crate::models::time_index::{ParsedStamp, TimeIndex, parse_stamp};

/// Index as produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawIndex {
    Naive(Vec<NaiveDateTime>),
    Aware(Vec<DateTime<FixedOffset>>),
    /// Timestamps the adapter left as text.
    Labels(Vec<String>),
}

impl RawIndex {
    pub fn len(&self) -> usize {
        match self {
            RawIndex::Naive(v) => v.len(),
            RawIndex::Aware(v) => v.len(),
            RawIndex::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the index into a typed [`TimeIndex`].
    ///
    /// Textual labels must all parse, and must all be naive or all be aware.
    pub fn resolve(self) -> Result<TimeIndex, SeriesError> {
        let labels = match self {
            RawIndex::Naive(v) => return Ok(TimeIndex::Naive(v)),
            RawIndex::Aware(v) => return Ok(TimeIndex::Aware(v)),
            RawIndex::Labels(labels) => labels,
        };

        let mut naive = Vec::new();
        let mut aware = Vec::new();
        for (position, label) in labels.iter().enumerate() {
            let bad = || SeriesError::NonTimestampIndex {
                position,
                label: label.clone(),
            };
            match parse_stamp(label).ok_or_else(bad)? {
                ParsedStamp::Naive(t) if aware.is_empty() => naive.push(t),
                ParsedStamp::Aware(t) if naive.is_empty() => aware.push(t),
                _ => return Err(bad()),
            }
        }

        Ok(if aware.is_empty() {
            TimeIndex::Naive(naive)
        } else {
            TimeIndex::Aware(aware)
        })
    }
}

impl From<TimeIndex> for RawIndex {
    fn from(index: TimeIndex) -> Self {
        match index {
            TimeIndex::Naive(v) => RawIndex::Naive(v),
            TimeIndex::Aware(v) => RawIndex::Aware(v),
        }
    }
}

/// One source's observations before normalization. Values are in MW.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub index: RawIndex,
    /// `None` marks a missing observation.
    pub values: Vec<Option<f64>>,
}

impl RawSeries {
    pub fn new(index: RawIndex, values: Vec<Option<f64>>) -> Self {
        Self { index, values }
    }

    /// Build from plain floats, treating `NaN` as missing.
    pub fn from_f64(index: RawIndex, values: impl IntoIterator<Item = f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_nan() { None } else { Some(v) })
            .collect();
        Self { index, values }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Validate the shape and type the index. Order and uniqueness are not checked.
    pub fn into_typed(self) -> Result<(TimeIndex, Vec<Option<f64>>), SeriesError> {
        if self.index.len() != self.values.len() {
            return Err(SeriesError::LengthMismatch {
                index: self.index.len(),
                values: self.values.len(),
            });
        }
        // NaN sneaking in through `new` is still a gap, not a value.
        let values = self
            .values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok((self.index.resolve()?, values))
    }
}

impl From<CanonicalSeries> for RawSeries {
    fn from(series: CanonicalSeries) -> Self {
        let (index, values) = series.into_parts();
        RawSeries::new(index.into(), values)
    }
}
