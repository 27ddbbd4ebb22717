//! Columnar frame bridge.
//!
//! Frame-shaped extraction results are materialized into the tuple-rows
//! representation the rest of the engine works on: column names, declared
//! dtypes, and positionally aligned rows.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta};
use polars::prelude::{AnyValue, DataFrame, DataType, TimeUnit};

use crate::error::{IngestError, Result};
use crate::models::{Row, Value};

/// Column names, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Declared dtypes, aligned to [`column_names`].
pub fn dtypes(df: &DataFrame) -> Vec<DataType> {
    df.dtypes()
}

/// Materialize every frame row into a tuple aligned to column order.
pub fn materialize(df: &DataFrame) -> Result<Vec<Row>> {
    let series = df.get_columns();
    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let mut row = Vec::with_capacity(series.len());
        for s in series {
            row.push(value_from_any(s.get(idx)?)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn value_from_any(av: AnyValue<'_>) -> Result<Value> {
    let value = match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        AnyValue::Int8(v) => Value::Int(v as i64),
        AnyValue::Int16(v) => Value::Int(v as i64),
        AnyValue::Int32(v) => Value::Int(v as i64),
        AnyValue::Int64(v) => Value::Int(v),
        AnyValue::UInt8(v) => Value::Int(v as i64),
        AnyValue::UInt16(v) => Value::Int(v as i64),
        AnyValue::UInt32(v) => Value::Int(v as i64),
        AnyValue::UInt64(v) => match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Numeric(v.to_string()),
        },
        AnyValue::Float32(v) => Value::Float(v as f64),
        AnyValue::Float64(v) => Value::Float(v),
        AnyValue::Date(days) => Value::Date(date_from_epoch_days(days)?),
        AnyValue::Datetime(v, unit, _) => Value::Timestamp(timestamp_from_units(v, unit)?),
        AnyValue::Time(ns) => Value::Time(time_from_midnight_nanos(ns)?),
        AnyValue::Decimal(v, scale) => Value::Numeric(format_decimal(v, scale)),
        AnyValue::Binary(b) => Value::Bytes(b.to_vec()),
        AnyValue::BinaryOwned(b) => Value::Bytes(b),
        other => Value::Text(other.to_string()),
    };
    Ok(value)
}

fn date_from_epoch_days(days: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .checked_add_signed(TimeDelta::days(days as i64))
        .ok_or_else(|| IngestError::Convert(format!("date out of range: {days} days from epoch")))
}

fn timestamp_from_units(v: i64, unit: TimeUnit) -> Result<chrono::DateTime<chrono::Utc>> {
    let ts = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
    };
    ts.ok_or_else(|| IngestError::Convert(format!("timestamp out of range: {v} ({unit:?})")))
}

fn time_from_midnight_nanos(ns: i64) -> Result<NaiveTime> {
    if ns < 0 {
        return Err(IngestError::Convert(format!("negative time of day: {ns}ns")));
    }
    let secs = (ns / 1_000_000_000) as u32;
    let nanos = (ns % 1_000_000_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .ok_or_else(|| IngestError::Convert(format!("time of day out of range: {ns}ns")))
}

/// Render a scaled decimal mantissa as its plain text form.
fn format_decimal(v: i128, scale: usize) -> String {
    if scale == 0 {
        return v.to_string();
    }
    let sign = if v < 0 { "-" } else { "" };
    let abs = v.unsigned_abs();
    let pow = 10u128.pow(scale as u32);
    format!("{sign}{}.{:0width$}", abs / pow, abs % pow, width = scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn materializes_mixed_frame_in_column_order() {
        let df = df![
            "id" => [1i64, 2, 3],
            "name" => ["a", "b", "c"],
            "score" => [0.5f64, 1.5, 2.5],
            "ok" => [true, false, true],
        ]
        .unwrap();

        let names = column_names(&df);
        assert_eq!(names, vec!["id", "name", "score", "ok"]);

        let rows = materialize(&df).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1],
            vec![
                Value::Int(2),
                Value::Text("b".to_string()),
                Value::Float(1.5),
                Value::Bool(false),
            ]
        );
    }

    #[test]
    fn nulls_survive_materialization() {
        let df = df!["v" => [Some(1i64), None, Some(3)]].unwrap();
        let rows = materialize(&df).unwrap();
        assert_eq!(rows[0], vec![Value::Int(1)]);
        assert_eq!(rows[1], vec![Value::Null]);
    }

    #[test]
    fn dtypes_align_with_columns() {
        let df = df!["id" => [1i32], "name" => ["x"]].unwrap();
        let d = dtypes(&df);
        assert_eq!(d[0], DataType::Int32);
        assert_eq!(d[1], DataType::String);
    }

    #[test]
    fn epoch_day_and_nanos_conversions() {
        assert_eq!(
            date_from_epoch_days(0).unwrap(),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
        assert_eq!(
            date_from_epoch_days(19_723).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        let t = time_from_midnight_nanos(3_600_000_000_000 + 500_000_000).unwrap();
        assert_eq!(t, NaiveTime::from_hms_milli_opt(1, 0, 0, 500).unwrap());
        assert!(time_from_midnight_nanos(-1).is_err());
    }

    #[test]
    fn decimal_formatting() {
        assert_eq!(format_decimal(12345, 2), "123.45");
        assert_eq!(format_decimal(-5, 3), "-0.005");
        assert_eq!(format_decimal(42, 0), "42");
    }
}
