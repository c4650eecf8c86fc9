//! Columnar (`.parquet`) layout.
//!
//! - `time`: `Timestamp(µs)`. Naive indices store wall-clock stamps and the
//!   zone name under [`REFERENCE_TIMEZONE_KEY`] (field metadata, mirrored in
//!   the schema metadata). Aware indices store UTC instants (`Timestamp(µs, "UTC")`)
//!   plus [`OFFSET_COLUMN`] so each row's offset survives.
//! - `<variable>`: nullable `Float64`; null is a gap.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::time_index::{TimeIndex, TimezoneState};
use demand_ingestor::tz::parse_time_zone;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::{OptionExt, ResultExt};

use super::{
    AmbiguousTimezoneSnafu, ArrowSnafu, Format, InvalidTimezoneSnafu, IoSnafu, MalformedSnafu,
    OFFSET_COLUMN, ParquetSnafu, PersistError, REFERENCE_TIMEZONE_KEY, SeriesSnafu, StoredSeries,
    TIME_COLUMN, TimezoneEncoding,
};

const UTC: &str = "UTC";

fn schema(variable_name: &str, encoding: TimezoneEncoding, aware: bool) -> SchemaRef {
    let mut fields = Vec::with_capacity(3);
    let mut metadata = HashMap::new();
    if aware {
        fields.push(Field::new(
            TIME_COLUMN,
            DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
            false,
        ));
        fields.push(Field::new(OFFSET_COLUMN, DataType::Int32, false));
    } else {
        if let TimezoneEncoding::Sidecar(tz) = encoding {
            metadata.insert(REFERENCE_TIMEZONE_KEY.to_string(), tz.name().to_string());
        }
        fields.push(
            Field::new(
                TIME_COLUMN,
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            )
            .with_metadata(metadata.clone()),
        );
    }
    fields.push(Field::new(variable_name, DataType::Float64, true));
    Arc::new(Schema::new_with_metadata(fields, metadata))
}

fn batch(
    series: &CanonicalSeries,
    variable_name: &str,
    encoding: TimezoneEncoding,
) -> Result<RecordBatch, PersistError> {
    let values: ArrayRef = Arc::new(Float64Array::from(series.values().to_vec()));
    let (schema, columns): (SchemaRef, Vec<ArrayRef>) = match series.index() {
        TimeIndex::Naive(stamps) => {
            let micros: Vec<i64> = stamps.iter().map(|t| t.and_utc().timestamp_micros()).collect();
            (
                schema(variable_name, encoding, false),
                vec![Arc::new(TimestampMicrosecondArray::from(micros)), values],
            )
        }
        TimeIndex::Aware(stamps) => {
            let micros: Vec<i64> = stamps.iter().map(|t| t.timestamp_micros()).collect();
            let offsets: Vec<i32> = stamps.iter().map(|t| t.offset().local_minus_utc()).collect();
            (
                schema(variable_name, encoding, true),
                vec![
                    Arc::new(TimestampMicrosecondArray::from(micros).with_timezone(UTC)),
                    Arc::new(Int32Array::from(offsets)),
                    values,
                ],
            )
        }
    };
    RecordBatch::try_new(schema, columns).context(ArrowSnafu)
}

pub(crate) fn write<W: Write + Send>(
    sink: W,
    path: &Path,
    series: &CanonicalSeries,
    variable_name: &str,
    encoding: TimezoneEncoding,
) -> Result<(), PersistError> {
    let batch = batch(series, variable_name, encoding)?;
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), None).context(ParquetSnafu { path })?;
    writer.write(&batch).context(ParquetSnafu { path })?;
    writer.close().context(ParquetSnafu { path })?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> Result<StoredSeries, PersistError> {
    let malformed = |message: &str| MalformedSnafu { path, message }.build();

    let file = File::open(path).context(IoSnafu { path })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context(ParquetSnafu { path })?;
    let schema = builder.schema().clone();
    let reader = builder.build().context(ParquetSnafu { path })?;

    let time_field = schema
        .field_with_name(TIME_COLUMN)
        .map_err(|_| malformed("missing 'time' column"))?;
    let aware = match time_field.data_type() {
        DataType::Timestamp(TimeUnit::Microsecond, None) => false,
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => true,
        other => return Err(malformed(&format!("unsupported time type {other:?}"))),
    };
    let variable_name = schema
        .fields()
        .iter()
        .map(|f| f.name())
        .find(|n| *n != TIME_COLUMN && *n != OFFSET_COLUMN)
        .cloned()
        .with_context(|| MalformedSnafu {
            path,
            message: "no value column",
        })?;

    let reference_timezone = if aware {
        None
    } else {
        let name = time_field
            .metadata()
            .get(REFERENCE_TIMEZONE_KEY)
            .or_else(|| schema.metadata().get(REFERENCE_TIMEZONE_KEY))
            .with_context(|| AmbiguousTimezoneSnafu {
                format: Format::Columnar,
                state: TimezoneState::Naive,
            })?;
        Some(parse_time_zone(name).context(InvalidTimezoneSnafu)?)
    };

    let mut micros: Vec<i64> = Vec::new();
    let mut offsets: Vec<i32> = Vec::new();
    let mut values: Vec<Option<f64>> = Vec::new();
    for batch in reader {
        let batch = batch.context(ArrowSnafu)?;
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .cloned()
                .ok_or_else(|| malformed(&format!("missing '{name}' column")))
        };

        let time = column(TIME_COLUMN)?;
        let time = time
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| malformed("time column is not microsecond timestamps"))?;
        if time.null_count() > 0 {
            return Err(malformed("null timestamps"));
        }
        micros.extend(time.values().iter().copied());

        if aware {
            let offset = column(OFFSET_COLUMN)?;
            let offset = offset
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| malformed("offset column is not Int32"))?;
            offsets.extend(offset.values().iter().copied());
        }

        let value = column(&variable_name)?;
        let value = value
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| malformed("value column is not Float64"))?;
        values.extend(value.iter());
    }

    let index = if aware {
        micros
            .iter()
            .zip(&offsets)
            .map(|(us, secs)| aware_stamp(*us, *secs))
            .collect::<Option<Vec<_>>>()
            .map(TimeIndex::Aware)
    } else {
        micros
            .iter()
            .map(|us| naive_stamp(*us))
            .collect::<Option<Vec<_>>>()
            .map(TimeIndex::Naive)
    }
    .ok_or_else(|| malformed("timestamp or offset out of range"))?;

    let series = CanonicalSeries::new(index, values).context(SeriesSnafu)?;
    Ok(StoredSeries {
        series,
        variable_name,
        reference_timezone,
    })
}

fn naive_stamp(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|t| t.naive_utc())
}

fn aware_stamp(micros: i64, offset_secs: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_secs)?;
    DateTime::from_timestamp_micros(micros).map(|t| t.with_timezone(&offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Tz;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn naive_schema_carries_the_zone() {
        let s = CanonicalSeries::naive(vec![at(0), at(1)], vec![Some(1.0), None]).unwrap();
        let b = batch(&s, "Load (MW)", TimezoneEncoding::Sidecar(Tz::America__New_York)).unwrap();
        let schema = b.schema();
        let time = schema.field_with_name(TIME_COLUMN).unwrap();
        assert_eq!(
            time.metadata().get(REFERENCE_TIMEZONE_KEY).map(String::as_str),
            Some("America/New_York")
        );
        assert_eq!(b.num_columns(), 2);
        assert_eq!(b.column(1).null_count(), 1);
    }

    #[test]
    fn aware_schema_has_offset_column() {
        let stamps = vec![DateTime::parse_from_rfc3339("2024-11-03T01:30:00-04:00").unwrap()];
        let s = CanonicalSeries::aware(stamps, vec![Some(5.0)]).unwrap();
        let b = batch(&s, "v", TimezoneEncoding::PerRowOffset).unwrap();
        let offsets = b
            .column_by_name(OFFSET_COLUMN)
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(offsets.value(0), -4 * 3600);
    }

    #[test]
    fn naive_file_without_zone_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.parquet");
        let s = CanonicalSeries::naive(vec![at(0)], vec![Some(1.0)]).unwrap();
        let file = File::create(&path).unwrap();
        write(file, &path, &s, "v", TimezoneEncoding::PerRowOffset).unwrap();

        assert!(matches!(
            read(&path),
            Err(PersistError::AmbiguousTimezone { .. })
        ));
    }

    #[test]
    fn unknown_zone_name_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mars.parquet");
        let mut metadata = HashMap::new();
        metadata.insert(REFERENCE_TIMEZONE_KEY.to_string(), "Mars/Olympus".to_string());
        let schema = Arc::new(Schema::new_with_metadata(
            vec![
                Field::new(TIME_COLUMN, DataType::Timestamp(TimeUnit::Microsecond, None), false),
                Field::new("v", DataType::Float64, true),
            ],
            metadata,
        ));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(TimestampMicrosecondArray::from(vec![0_i64])),
                Arc::new(Float64Array::from(vec![Some(1.0)])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            read(&path),
            Err(PersistError::InvalidTimezone { .. })
        ));
    }
}
