//! Destination column type inference.
//!
//! Two inference paths feed table provisioning. Tuple-shaped results carry no
//! type information, so the first row's values decide each column's type;
//! later rows are never consulted. Frame-shaped results carry dtypes for the
//! whole column, which is authoritative. An explicit per-column override map
//! wins over both.

use std::collections::HashMap;

use polars::prelude::DataType;

use crate::models::{Row, Value};

/// One destination column definition, ready for DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub pg_type: String,
}

/// Destination type for a single runtime value.
///
/// Only the scalar kinds listed here are distinguished; everything else
/// (dates, times, numerics, binary arriving untyped) lands in TEXT. Frame
/// dtypes cover those precisely.
pub fn pg_type_of_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "TEXT",
        Value::Int(_) => "BIGINT",
        Value::Float(_) => "DOUBLE PRECISION",
        Value::Bool(_) => "BOOLEAN",
        Value::Timestamp(_) => "TIMESTAMPTZ",
        Value::Text(_) => "TEXT",
        _ => "TEXT",
    }
}

/// Destination type for a declared frame dtype, with TEXT as the fallback
/// for anything unmapped.
pub fn pg_type_of_dtype(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::String => "TEXT",
        DataType::Int8 | DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float32 => "REAL",
        DataType::Float64 => "DOUBLE PRECISION",
        DataType::Boolean => "BOOLEAN",
        DataType::Date => "DATE",
        DataType::Datetime(_, _) => "TIMESTAMPTZ",
        DataType::Time => "TIME",
        DataType::Decimal(_, _) => "NUMERIC",
        DataType::Binary => "BYTEA",
        _ => "TEXT",
    }
}

/// Resolve the full column definition list for provisioning.
///
/// Per column, precedence is: override, declared dtype, first-row value. If
/// any column cannot be resolved (zero rows, no dtypes, no override for it),
/// no definitions are returned and the provisioner will not create a table.
pub fn column_defs(
    columns: &[String],
    first_row: Option<&Row>,
    dtypes: Option<&[DataType]>,
    overrides: Option<&HashMap<String, String>>,
) -> Vec<ColumnDef> {
    let mut defs = Vec::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        let pg_type = overrides
            .and_then(|map| map.get(name).cloned())
            .or_else(|| {
                dtypes
                    .and_then(|d| d.get(idx))
                    .map(|d| pg_type_of_dtype(d).to_string())
            })
            .or_else(|| {
                first_row
                    .and_then(|row| row.get(idx))
                    .map(|v| pg_type_of_value(v).to_string())
            });
        match pg_type {
            Some(pg_type) => defs.push(ColumnDef {
                name: name.clone(),
                pg_type,
            }),
            None => return Vec::new(),
        }
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn value_inference_matches_scalar_kinds() {
        assert_eq!(pg_type_of_value(&Value::Null), "TEXT");
        assert_eq!(pg_type_of_value(&Value::Int(42)), "BIGINT");
        assert_eq!(pg_type_of_value(&Value::Float(3.14)), "DOUBLE PRECISION");
        assert_eq!(pg_type_of_value(&Value::Bool(true)), "BOOLEAN");
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        assert_eq!(pg_type_of_value(&Value::Timestamp(ts)), "TIMESTAMPTZ");
        assert_eq!(pg_type_of_value(&Value::Text("x".into())), "TEXT");
    }

    #[test]
    fn untyped_exotics_fall_back_to_text() {
        assert_eq!(pg_type_of_value(&Value::Numeric("1.5".into())), "TEXT");
        assert_eq!(pg_type_of_value(&Value::Bytes(vec![1])), "TEXT");
    }

    #[test]
    fn dtype_inference_covers_the_mapping_table() {
        assert_eq!(pg_type_of_dtype(&DataType::String), "TEXT");
        assert_eq!(pg_type_of_dtype(&DataType::Int8), "SMALLINT");
        assert_eq!(pg_type_of_dtype(&DataType::Int16), "SMALLINT");
        assert_eq!(pg_type_of_dtype(&DataType::Int32), "INTEGER");
        assert_eq!(pg_type_of_dtype(&DataType::Int64), "BIGINT");
        assert_eq!(pg_type_of_dtype(&DataType::Float32), "REAL");
        assert_eq!(pg_type_of_dtype(&DataType::Float64), "DOUBLE PRECISION");
        assert_eq!(pg_type_of_dtype(&DataType::Boolean), "BOOLEAN");
        assert_eq!(pg_type_of_dtype(&DataType::Date), "DATE");
        assert_eq!(pg_type_of_dtype(&DataType::Time), "TIME");
        assert_eq!(pg_type_of_dtype(&DataType::Binary), "BYTEA");
        // Unmapped dtypes degrade to TEXT.
        assert_eq!(pg_type_of_dtype(&DataType::UInt64), "TEXT");
    }

    #[test]
    fn overrides_win_over_both_inference_paths() {
        let columns = vec!["id".to_string(), "amount".to_string()];
        let row: Row = vec![Value::Int(1), Value::Float(2.5)];
        let mut overrides = HashMap::new();
        overrides.insert("amount".to_string(), "NUMERIC(12,2)".to_string());

        let defs = column_defs(&columns, Some(&row), None, Some(&overrides));
        assert_eq!(defs[0].pg_type, "BIGINT");
        assert_eq!(defs[1].pg_type, "NUMERIC(12,2)");
    }

    #[test]
    fn first_row_only_decides_tuple_types() {
        let columns = vec!["v".to_string()];
        let first: Row = vec![Value::Null];
        // Later rows carrying integers are never consulted.
        let defs = column_defs(&columns, Some(&first), None, None);
        assert_eq!(defs[0].pg_type, "TEXT");
    }

    #[test]
    fn unresolvable_columns_yield_no_defs() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let mut overrides = HashMap::new();
        overrides.insert("a".to_string(), "TEXT".to_string());
        // No rows, no dtypes, and "b" has no override: nothing to type against.
        let defs = column_defs(&columns, None, None, Some(&overrides));
        assert!(defs.is_empty());
    }
}
