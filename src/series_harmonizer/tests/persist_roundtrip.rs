mod common;

use chrono_tz::Tz;
use common::{Workspace, rfc3339, wall};
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::time_index::{TimeIndex, TimezoneState};
use series_harmonizer::persist::{self, PersistError};

#[test]
fn delimited_roundtrip_keeps_every_offset() {
    let ws = Workspace::new();
    let path = ws.path("entsoe/DE.csv");
    // spring-forward night in Berlin, with a gap
    let series = CanonicalSeries::aware(
        vec![
            rfc3339("2024-03-31T01:00:00+01:00"),
            rfc3339("2024-03-31T03:00:00+02:00"),
            rfc3339("2024-03-31T04:00:00+02:00"),
        ],
        vec![Some(41_234.5), None, Some(40_000.0)],
    )
    .unwrap();

    persist::save(&series, &path, "Load (MW)", None).unwrap();
    let stored = persist::load(&path).unwrap();

    assert_eq!(stored.series, series);
    assert_eq!(stored.variable_name, "Load (MW)");
    assert_eq!(stored.reference_timezone, None);
    let TimeIndex::Aware(stamps) = stored.series.index() else {
        panic!("expected aware index");
    };
    assert_eq!(stamps[0].offset().local_minus_utc(), 3600);
    assert_eq!(stamps[1].offset().local_minus_utc(), 7200);
}

#[test]
fn columnar_roundtrip_with_reference_timezone() {
    let ws = Workspace::new();
    let path = ws.path("eia/US_NY.parquet");
    let series = CanonicalSeries::naive(
        vec![
            wall(2024, 11, 3, 0, 0),
            wall(2024, 11, 3, 1, 0),
            wall(2024, 11, 3, 2, 0),
        ],
        vec![Some(17_000.25), Some(16_500.0), None],
    )
    .unwrap();

    persist::save(&series, &path, "Load (MW)", Some(Tz::America__New_York)).unwrap();
    let stored = persist::load(&path).unwrap();

    assert_eq!(stored.series, series);
    assert_eq!(stored.series.timezone_state(), TimezoneState::Naive);
    assert_eq!(stored.reference_timezone, Some(Tz::America__New_York));
}

#[test]
fn columnar_roundtrip_of_aware_series_ignores_reference() {
    let ws = Workspace::new();
    let path = ws.path("IN.PARQUET");
    let series = CanonicalSeries::aware(
        vec![
            rfc3339("2024-01-01T10:00:00+05:30"),
            rfc3339("2024-01-01T11:00:00.250+05:30"),
        ],
        vec![Some(1.0), Some(2.0)],
    )
    .unwrap();

    persist::save(&series, &path, "demand", Some(Tz::Europe__Paris)).unwrap();
    let stored = persist::load(&path).unwrap();
    assert_eq!(stored.series, series);
    assert_eq!(stored.reference_timezone, None);
}

#[test]
fn rejections_happen_before_any_file_exists() {
    let ws = Workspace::new();
    let naive = CanonicalSeries::naive(vec![wall(2024, 1, 1, 0, 0)], vec![Some(1.0)]).unwrap();

    let err = persist::save(&naive, &ws.path("out/a.csv"), "Load (MW)", Some(Tz::UTC)).unwrap_err();
    assert!(matches!(err, PersistError::AmbiguousTimezone { .. }));

    let err = persist::save(&naive, &ws.path("out/a.parquet"), "Load (MW)", None).unwrap_err();
    assert!(matches!(err, PersistError::AmbiguousTimezone { .. }));

    let err = persist::save(&naive, &ws.path("out/a.json"), "Load (MW)", Some(Tz::UTC)).unwrap_err();
    assert!(matches!(err, PersistError::UnsupportedFormat { .. }));

    assert!(!ws.path("out").exists());
}

#[test]
fn saving_twice_replaces_the_file() {
    let ws = Workspace::new();
    let path = ws.path("DE.parquet");
    let first = CanonicalSeries::naive(vec![wall(2024, 1, 1, 0, 0)], vec![Some(1.0)]).unwrap();
    let second = CanonicalSeries::naive(
        vec![wall(2024, 1, 1, 0, 0), wall(2024, 1, 1, 1, 0)],
        vec![Some(1.0), Some(2.0)],
    )
    .unwrap();

    persist::save(&first, &path, "v", Some(Tz::Europe__Berlin)).unwrap();
    persist::save(&second, &path, "v", Some(Tz::Europe__Berlin)).unwrap();

    assert_eq!(persist::load(&path).unwrap().series, second);
    assert_eq!(ws.file_count(""), 1);
}
