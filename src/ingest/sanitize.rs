//! Row sanitization before transfer.
//!
//! PostgreSQL's COPY input has no representation for NaN or infinite values
//! in the general case our loads rely on, so non-finite floats become null.
//! Every other field passes through untouched.

use crate::models::{Row, Value};

/// Replace non-finite floating fields with null, in place. Idempotent.
pub fn sanitize_row(row: &mut Row) {
    for field in row.iter_mut() {
        if let Value::Float(f) = field {
            if !f.is_finite() {
                *field = Value::Null;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_floats_become_null() {
        let mut row: Row = vec![
            Value::Float(f64::NAN),
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(1.25),
        ];
        sanitize_row(&mut row);
        assert_eq!(row[0], Value::Null);
        assert_eq!(row[1], Value::Null);
        assert_eq!(row[2], Value::Null);
        assert_eq!(row[3], Value::Float(1.25));
    }

    #[test]
    fn non_float_fields_pass_through() {
        let mut row: Row = vec![
            Value::Int(7),
            Value::Text("inf".to_string()),
            Value::Bool(false),
            Value::Null,
        ];
        let expected = row.clone();
        sanitize_row(&mut row);
        assert_eq!(row, expected);
    }

    #[test]
    fn sanitization_is_idempotent() {
        let mut row: Row = vec![Value::Float(f64::NAN), Value::Float(0.5)];
        sanitize_row(&mut row);
        let once = row.clone();
        sanitize_row(&mut row);
        assert_eq!(row, once);
    }
}
