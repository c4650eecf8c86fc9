//! Delimited (`.csv`) layout: `time,<variable>` with one RFC-3339 stamp per row.
//!
//! Offsets are mandatory on every row; an empty value field is a gap.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::time_index::{ParsedStamp, TimezoneState, parse_stamp};
use snafu::{OptionExt, ResultExt};

use super::{
    AmbiguousTimezoneSnafu, CsvSnafu, Format, IoSnafu, MalformedSnafu, PersistError,
    SeriesSnafu, StoredSeries, TIME_COLUMN,
};

pub(crate) fn write<W: Write>(
    sink: W,
    path: &Path,
    stamps: &[DateTime<FixedOffset>],
    values: &[Option<f64>],
    variable_name: &str,
) -> Result<(), PersistError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record([TIME_COLUMN, variable_name])
        .context(CsvSnafu { path })?;
    for (t, v) in stamps.iter().zip(values) {
        let stamp = t.to_rfc3339_opts(SecondsFormat::AutoSi, false);
        let value = v.map(|x| x.to_string()).unwrap_or_default();
        writer
            .write_record([stamp.as_str(), value.as_str()])
            .context(CsvSnafu { path })?;
    }
    writer.flush().context(IoSnafu { path })?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> Result<StoredSeries, PersistError> {
    let file = File::open(path).context(IoSnafu { path })?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers().context(CsvSnafu { path })?.clone();
    let variable_name = match (headers.get(0), headers.get(1), headers.len()) {
        (Some(TIME_COLUMN), Some(name), 2) => name.to_string(),
        _ => {
            return MalformedSnafu {
                path,
                message: format!("expected header '{TIME_COLUMN},<variable>', got {headers:?}"),
            }
            .fail();
        }
    };

    let mut stamps = Vec::new();
    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.context(CsvSnafu { path })?;
        let label = record.get(0).unwrap_or_default();
        let stamp = match parse_stamp(label) {
            Some(ParsedStamp::Aware(t)) => t,
            Some(ParsedStamp::Naive(_)) => {
                return AmbiguousTimezoneSnafu {
                    format: Format::Delimited,
                    state: TimezoneState::Naive,
                }
                .fail();
            }
            None => {
                return MalformedSnafu {
                    path,
                    message: format!("row {row}: '{label}' is not a timestamp"),
                }
                .fail();
            }
        };
        stamps.push(stamp);
        values.push(parse_value(record.get(1).unwrap_or_default()).with_context(|| {
            MalformedSnafu {
                path,
                message: format!("row {row}: value is not a number"),
            }
        })?);
    }

    let series = CanonicalSeries::aware(stamps, values).context(SeriesSnafu)?;
    Ok(StoredSeries {
        series,
        variable_name,
        reference_timezone: None,
    })
}

// `Some(None)` for an empty field, `None` if unparseable.
fn parse_value(field: &str) -> Option<Option<f64>> {
    let field = field.trim();
    if field.is_empty() {
        return Some(None);
    }
    field.parse::<f64>().ok().map(Some)
}
