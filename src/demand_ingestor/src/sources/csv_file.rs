//! File-backed source: one delimited export per region code.
//!
//! Many publishers only offer bulk downloads. Once fetched, such dumps sit in a
//! folder as `<code>.csv` and this adapter turns them into [`RawSeries`]. The
//! per-source quirks are configuration, not code:
//! - which columns hold the timestamp and the demand value,
//! - the timestamp format (left to the harmonizer's parser when absent),
//! - the local zone of offset-less wall-clock stamps and its DST policy,
//! - a fixed time shift, e.g. +60 minutes for sources that stamp the interval start.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::models::raw_series::{RawIndex, RawSeries};
use crate::sources::{
    CsvSnafu, DelimiterSnafu, IndexSnafu, LocalizeSnafu, MissingColumnSnafu, NoDataSnafu, ReadSnafu,
    SourceAdapter, SourceError, TimestampSnafu,
};
use crate::tz::{DstPolicy, localize_all, parse_time_zone};

/// Per-source parsing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvSourceSettings {
    /// Header of the timestamp column.
    pub time_column: String,
    /// Header of the demand column (MW).
    pub value_column: String,
    /// `strftime` format of the timestamps. Formats containing `%z`/`%:z` yield aware stamps.
    #[serde(default)]
    pub time_format: Option<String>,
    /// IANA zone of offset-less timestamps.
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub dst_policy: DstPolicy,
    /// Fixed correction added to every timestamp.
    #[serde(default)]
    pub time_shift_minutes: i64,
    /// Field separator; must be ASCII.
    #[serde(default = "default_delimiter", deserialize_with = "ascii_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

fn ascii_delimiter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<char, D::Error> {
    let c = char::deserialize(deserializer)?;
    if c.is_ascii() {
        Ok(c)
    } else {
        Err(de::Error::invalid_value(
            Unexpected::Char(c),
            &"an ASCII delimiter",
        ))
    }
}

impl CsvSourceSettings {
    pub fn new(time_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            time_column: time_column.into(),
            value_column: value_column.into(),
            time_format: None,
            time_zone: None,
            dst_policy: DstPolicy::default(),
            time_shift_minutes: 0,
            delimiter: default_delimiter(),
        }
    }
}

/// Adapter reading `<folder>/<code>.csv`.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    id: String,
    folder: PathBuf,
    settings: CsvSourceSettings,
}

impl CsvFileSource {
    pub fn new(id: impl Into<String>, folder: impl Into<PathBuf>, settings: CsvSourceSettings) -> Self {
        Self {
            id: id.into(),
            folder: folder.into(),
            settings,
        }
    }

    pub fn path_for(&self, code: &str) -> PathBuf {
        self.folder.join(format!("{code}.csv"))
    }

    /// Parse an in-memory export. `path` is only used in error messages.
    pub fn parse(&self, path: &Path, bytes: &[u8]) -> Result<RawSeries, SourceError> {
        let s = &self.settings;
        let delimiter = u8::try_from(s.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .context(DelimiterSnafu {
                delimiter: s.delimiter,
            })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader.headers().context(CsvSnafu { path })?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .context(MissingColumnSnafu { column: name })
        };
        let time_col = column(&s.time_column)?;
        let value_col = column(&s.value_column)?;

        let mut labels = Vec::new();
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record.context(CsvSnafu { path })?;
            labels.push(record.get(time_col).unwrap_or_default().to_string());
            values.push(
                record
                    .get(value_col)
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite()),
            );
        }

        let index = self.type_index(labels)?;
        Ok(RawSeries::new(index, values))
    }

    fn type_index(&self, labels: Vec<String>) -> Result<RawIndex, SourceError> {
        let s = &self.settings;
        let mut index = match &s.time_format {
            Some(fmt) => parse_with_format(&labels, fmt)?,
            None => RawIndex::Labels(labels),
        };

        if s.time_zone.is_none() && s.time_shift_minutes == 0 {
            return Ok(index);
        }

        if let RawIndex::Labels(_) = index {
            index = index.resolve().context(IndexSnafu)?.into();
        }

        if let Some(name) = &s.time_zone {
            if let RawIndex::Naive(stamps) = &index {
                let tz = parse_time_zone(name).context(LocalizeSnafu)?;
                let aware = localize_all(stamps, tz, s.dst_policy).context(LocalizeSnafu)?;
                index = RawIndex::Aware(aware);
            }
        }

        let shift = TimeDelta::minutes(s.time_shift_minutes);
        Ok(match index {
            RawIndex::Naive(v) => RawIndex::Naive(v.into_iter().map(|t| t + shift).collect()),
            RawIndex::Aware(v) => RawIndex::Aware(v.into_iter().map(|t| t + shift).collect()),
            labels @ RawIndex::Labels(_) => labels,
        })
    }
}

fn parse_with_format(labels: &[String], fmt: &str) -> Result<RawIndex, SourceError> {
    if fmt.contains("%z") || fmt.contains("%:z") {
        labels
            .iter()
            .enumerate()
            .map(|(row, l)| {
                DateTime::parse_from_str(l, fmt)
                    .ok()
                    .context(TimestampSnafu { row, label: l })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RawIndex::Aware)
    } else {
        labels
            .iter()
            .enumerate()
            .map(|(row, l)| {
                NaiveDateTime::parse_from_str(l, fmt)
                    .ok()
                    .context(TimestampSnafu { row, label: l })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RawIndex::Naive)
    }
}

#[async_trait]
impl SourceAdapter for CsvFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, code: &str) -> Result<RawSeries, SourceError> {
        let path = self.path_for(code);
        let bytes = tokio::fs::read(&path).await.context(ReadSnafu { path: &path })?;
        let series = self.parse(&path, &bytes)?;
        if series.is_empty() {
            return NoDataSnafu { code }.fail();
        }
        debug!(source = %self.id, code, rows = series.len(), "read raw series");
        Ok(series)
    }
}
