//! Column label and timestamp normalization.
//!
//! Cleans ingested tables: snake-cased labels, a combined `datetime` column
//! derived from separate `date` and `time` columns, moved to the third position
//! and sorted newest first. Unparseable dates or times become nulls rather than
//! failing the table.

use crate::constants::{
    DATE_COLUMN, DATE_FORMAT, DATETIME_COLUMN, DATETIME_POSITION, TIME_COLUMN, TIME_FORMAT,
};
use crate::error::{EtlError, Result};
use crate::models::NormalizeMode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("capitalized word pattern is valid"));
static LOWER_TO_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("case boundary pattern is valid"));
static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"));

/// Normalize a table according to `mode`
pub fn normalize(df: DataFrame, mode: NormalizeMode) -> Result<DataFrame> {
    match mode {
        NormalizeMode::None => Ok(df),
        NormalizeMode::Minimal => clean_names(df),
        NormalizeMode::Full => standard_clean(df),
    }
}

/// Rewrite a label as lower-case words joined by underscores
///
/// `CO2 Flux` → `co2_flux`, `WindSpeed` → `wind_speed`, `Date` → `date`.
pub fn to_snake_case(label: &str) -> String {
    let spaced = CAPITALIZED_WORD.replace_all(label, "${1}_${2}");
    let spaced = LOWER_TO_UPPER.replace_all(&spaced, "${1}_${2}");
    let lower = spaced.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Snake-case every column label
///
/// Labels that clean to nothing become `column_<index>`; labels that collide
/// after cleaning get a numeric suffix.
pub fn clean_names(mut df: DataFrame) -> Result<DataFrame> {
    let mut seen = HashSet::new();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let mut base = to_snake_case(name);
            if base.is_empty() {
                base = format!("column_{}", index);
            }
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect();

    df.set_column_names(names)?;
    Ok(df)
}

/// Full cleaning: snake-case labels, derive `datetime` from `date` + `time`,
/// move it to the third column and sort newest first (nulls last)
pub fn standard_clean(df: DataFrame) -> Result<DataFrame> {
    let mut df = clean_names(df)?;
    require_column(&df, DATE_COLUMN)?;
    require_column(&df, TIME_COLUMN)?;

    let dates = parse_dates(df.column(DATE_COLUMN)?)?;
    let times = parse_times(df.column(TIME_COLUMN)?)?;

    let datetimes: Vec<Option<NaiveDateTime>> = dates
        .iter()
        .zip(&times)
        .map(|(date, time)| Some(date.as_ref()?.and_time(*time.as_ref()?)))
        .collect();

    df.with_column(date_column(DATE_COLUMN, &dates)?)?;
    df.with_column(time_column(TIME_COLUMN, &times)?)?;
    df.with_column(datetime_column(DATETIME_COLUMN, &datetimes)?)?;

    let df = move_column(&df, DATETIME_COLUMN, DATETIME_POSITION)?;
    let df = df.sort(
        [DATETIME_COLUMN],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_nulls_last(true),
    )?;

    debug!("Normalized {} rows", df.height());
    Ok(df)
}

/// Batch cleaning before a SQL write
///
/// Parses `date`, reads `time` as a time-of-day duration, adds them into
/// `datetime` (third column), then drops `date` and `time`.
pub fn prepare_batch(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    require_column(&df, DATE_COLUMN)?;
    require_column(&df, TIME_COLUMN)?;

    let dates = parse_dates(df.column(DATE_COLUMN)?)?;
    let durations: Vec<Option<TimeDelta>> = string_values(df.column(TIME_COLUMN)?)?
        .iter()
        .map(|value| value.as_deref().and_then(parse_duration))
        .collect();

    let datetimes: Vec<Option<NaiveDateTime>> = dates
        .iter()
        .zip(&durations)
        .map(|(date, duration)| {
            let midnight = date.as_ref()?.and_time(NaiveTime::MIN);
            midnight.checked_add_signed(*duration.as_ref()?)
        })
        .collect();

    df.with_column(datetime_column(DATETIME_COLUMN, &datetimes)?)?;
    let df = move_column(&df, DATETIME_COLUMN, DATETIME_POSITION)?;
    Ok(df.drop(DATE_COLUMN)?.drop(TIME_COLUMN)?)
}

fn require_column(df: &DataFrame, column: &str) -> Result<()> {
    if df.get_column_index(column).is_some() {
        return Ok(());
    }
    let available: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    Err(EtlError::MissingColumn {
        column: column.to_string(),
        available: available.join(", "),
    })
}

/// Reorder so `name` sits at `position` (or last, for narrow tables)
fn move_column(df: &DataFrame, name: &str, position: usize) -> Result<DataFrame> {
    let mut names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .filter(|n| n != name)
        .collect();
    names.insert(position.min(names.len()), name.to_string());
    Ok(df.select(names)?)
}

fn string_values(column: &Column) -> Result<Vec<Option<String>>> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn parse_dates(column: &Column) -> Result<Vec<Option<NaiveDate>>> {
    Ok(string_values(column)?
        .iter()
        .map(|v| {
            v.as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
        })
        .collect())
}

fn parse_times(column: &Column) -> Result<Vec<Option<NaiveTime>>> {
    Ok(string_values(column)?
        .iter()
        .map(|v| v.as_deref().and_then(parse_time_of_day))
        .collect())
}

/// Parse `HH:MM:SS.f`; the fraction is mandatory (1 to 6 digits)
fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let (_, fraction) = value.rsplit_once('.')?;
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(value, TIME_FORMAT).ok()
}

/// Parse `H:MM:SS[.fff]` into a duration; hours may exceed 23
fn parse_duration(value: &str) -> Option<TimeDelta> {
    let mut parts = value.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if hours < 0 || !(0..60).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let nanos = (seconds * 1e9).round() as i64;
    Some(TimeDelta::try_hours(hours)? + TimeDelta::minutes(minutes) + TimeDelta::nanoseconds(nanos))
}

fn unix_epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

fn date_column(name: &str, values: &[Option<NaiveDate>]) -> Result<Column> {
    let epoch = unix_epoch();
    let days: Vec<Option<i32>> = values
        .iter()
        .map(|v| v.map(|d| (d - epoch).num_days() as i32))
        .collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?.into())
}

fn time_column(name: &str, values: &[Option<NaiveTime>]) -> Result<Column> {
    let nanos: Vec<Option<i64>> = values
        .iter()
        .map(|v| {
            v.map(|t| t.num_seconds_from_midnight() as i64 * 1_000_000_000 + t.nanosecond() as i64)
        })
        .collect();
    Ok(Series::new(name.into(), nanos).cast(&DataType::Time)?.into())
}

fn datetime_column(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Column> {
    let micros: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|dt| dt.and_utc().timestamp_micros()))
        .collect();
    Ok(Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        .into())
}

/// Read a `Datetime` column back into naive timestamps
pub fn datetime_values(column: &Column) -> Result<Vec<Option<NaiveDateTime>>> {
    let DataType::Datetime(unit, _) = column.dtype() else {
        return Err(EtlError::Configuration {
            message: format!("column '{}' is not a datetime column", column.name()),
        });
    };
    let unit = *unit;
    let raw = column.cast(&DataType::Int64)?;
    Ok(raw
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|v| {
            let v = v?;
            let dt = match unit {
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
            };
            dt.map(|dt| dt.naive_utc())
        })
        .collect())
}

/// Read a `Date` column back into calendar dates
pub fn date_values(column: &Column) -> Result<Vec<Option<NaiveDate>>> {
    let epoch = unix_epoch();
    let raw = column.cast(&DataType::Int32)?;
    Ok(raw
        .as_materialized_series()
        .i32()?
        .into_iter()
        .map(|v| epoch.checked_add_signed(TimeDelta::days(v? as i64)))
        .collect())
}

/// Read a `Time` column back into times of day
pub fn time_values(column: &Column) -> Result<Vec<Option<NaiveTime>>> {
    let raw = column.cast(&DataType::Int64)?;
    Ok(raw
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|v| {
            let v = v?;
            NaiveTime::from_num_seconds_from_midnight_opt(
                (v / 1_000_000_000) as u32,
                (v % 1_000_000_000) as u32,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Site ID".into(), ["a", "b", "c", "d"]),
            Column::new("Date".into(), ["2023-01-01", "2023-01-02", "bad", "2023-01-01"]),
            Column::new(
                "Time".into(),
                ["13:45:00.000", "00:00:00.500", "10:00:00.000", "14:00:00.000"],
            ),
            Column::new("CO2Flux".into(), [1.0f64, 2.0, 3.0, 4.0]),
        ])
        .unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("Date"), "date");
        assert_eq!(to_snake_case("CO2 Flux"), "co2_flux");
        assert_eq!(to_snake_case("WindSpeed"), "wind_speed");
        assert_eq!(to_snake_case("co2Flux"), "co2_flux");
        assert_eq!(to_snake_case("H2O"), "h2_o");
        assert_eq!(to_snake_case("  Air-Temp (C) "), "air_temp_c");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("%%"), "");
    }

    #[test]
    fn test_minimal_mode_only_renames() {
        let df = normalize(raw_frame(), NormalizeMode::Minimal).unwrap();
        assert_eq!(names(&df), vec!["site_id", "date", "time", "co2_flux"]);
        assert_eq!(df.height(), 4);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_colliding_labels_are_suffixed() {
        let df = DataFrame::new(vec![
            Column::new("Flux".into(), [1i64]),
            Column::new("flux".into(), [2i64]),
            Column::new("??".into(), [3i64]),
        ])
        .unwrap();
        let df = clean_names(df).unwrap();
        assert_eq!(names(&df), vec!["flux", "flux_1", "column_2"]);
    }

    #[test]
    fn test_full_mode_derives_sorted_datetime() {
        let df = normalize(raw_frame(), NormalizeMode::Full).unwrap();

        assert_eq!(names(&df), vec!["site_id", "date", "datetime", "time", "co2_flux"]);

        let datetimes = datetime_values(df.column("datetime").unwrap()).unwrap();
        let half_past_midnight = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_milli_opt(0, 0, 0, 500)
            .unwrap();
        assert_eq!(
            datetimes,
            vec![
                Some(half_past_midnight),
                Some(ymd_hms(2023, 1, 1, 14, 0, 0)),
                Some(ymd_hms(2023, 1, 1, 13, 45, 0)),
                None,
            ]
        );

        let sites = df.column("site_id").unwrap().as_materialized_series().clone();
        let sites: Vec<Option<&str>> = sites.str().unwrap().into_iter().collect();
        assert_eq!(sites, vec![Some("b"), Some("d"), Some("a"), Some("c")]);

        // the unparseable date is kept as a null, not an error
        let dates = date_values(df.column("date").unwrap()).unwrap();
        assert_eq!(dates[3], None);
        let times = time_values(df.column("time").unwrap()).unwrap();
        assert_eq!(times[2], NaiveTime::from_hms_opt(13, 45, 0));
    }

    #[test]
    fn test_full_mode_non_increasing() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), ["2023-03-01", "2022-12-31", "2023-06-15", "2023-03-01"]),
            Column::new("time".into(), ["08:00:00.000", "23:59:59.999", "12:00:00.000", "09:00:00.5"]),
        ])
        .unwrap();
        let df = standard_clean(df).unwrap();
        let datetimes: Vec<NaiveDateTime> = datetime_values(df.column("datetime").unwrap())
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(datetimes.len(), 4);
        assert!(datetimes.windows(2).all(|w| w[0] >= w[1]));
        // narrow tables get the timestamp appended last
        assert_eq!(names(&df), vec!["date", "time", "datetime"]);
    }

    #[test]
    fn test_full_mode_requires_date_and_time() {
        let df = DataFrame::new(vec![Column::new("Time".into(), ["13:45:00.000"])]).unwrap();
        match standard_clean(df) {
            Err(EtlError::MissingColumn { column, available }) => {
                assert_eq!(column, "date");
                assert_eq!(available, "time");
            }
            other => panic!("Expected MissingColumn, got {:?}", other),
        }

        let df = DataFrame::new(vec![Column::new("DATE".into(), ["2023-01-01"])]).unwrap();
        match standard_clean(df) {
            Err(EtlError::MissingColumn { column, .. }) => assert_eq!(column, "time"),
            other => panic!("Expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_batch_adds_duration_and_drops_parts() {
        let df = DataFrame::new(vec![
            Column::new("site".into(), ["a", "b", "c"]),
            Column::new("flux".into(), [1.0f64, 2.0, 3.0]),
            Column::new("date".into(), ["2023-01-01", "2023-01-01", "2023-01-01"]),
            Column::new("time".into(), ["13:45:00.000", "25:00:00", "nonsense"]),
        ])
        .unwrap();

        let df = prepare_batch(df).unwrap();
        assert_eq!(names(&df), vec!["site", "flux", "datetime"]);

        let datetimes = datetime_values(df.column("datetime").unwrap()).unwrap();
        assert_eq!(
            datetimes,
            vec![
                Some(ymd_hms(2023, 1, 1, 13, 45, 0)),
                Some(ymd_hms(2023, 1, 2, 1, 0, 0)),
                None,
            ]
        );
    }

    #[test]
    fn test_time_of_day_requires_fraction() {
        assert_eq!(
            parse_time_of_day("09:00:00.5"),
            NaiveTime::from_hms_milli_opt(9, 0, 0, 500)
        );
        assert_eq!(
            parse_time_of_day("23:59:59.999999"),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        );
        assert_eq!(parse_time_of_day("09:00:00"), None);
        assert_eq!(parse_time_of_day("09:00:00."), None);
        assert_eq!(parse_time_of_day("09:00:00.1234567"), None);
        assert_eq!(parse_time_of_day("nonsense"), None);

        let df = DataFrame::new(vec![
            Column::new("date".into(), ["2023-03-01", "2023-03-01"]),
            Column::new("time".into(), ["09:00:00", "08:00:00.000"]),
        ])
        .unwrap();
        let df = standard_clean(df).unwrap();
        let datetimes = datetime_values(df.column("datetime").unwrap()).unwrap();
        assert_eq!(datetimes, vec![Some(ymd_hms(2023, 3, 1, 8, 0, 0)), None]);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("01:30:00"), Some(TimeDelta::minutes(90)));
        assert_eq!(
            parse_duration("00:00:01.250"),
            Some(TimeDelta::milliseconds(1250))
        );
        assert_eq!(parse_duration("00:61:00"), None);
        assert_eq!(parse_duration("12:00"), None);
    }

    #[test]
    fn test_datetime_values_rejects_other_types() {
        let column = Column::new("x".into(), [1i64]);
        assert!(matches!(
            datetime_values(&column),
            Err(EtlError::Configuration { .. })
        ));
    }
}
