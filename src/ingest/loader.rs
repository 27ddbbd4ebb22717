//! Bulk loading over the COPY protocol.
//!
//! Rows stream into the destination through a single
//! `COPY schema.table (cols) FROM STDIN` channel in text format, one encoded
//! line per row, with sanitization applied as rows pass through. A failure
//! anywhere aborts the whole load and the destination table must be treated
//! as possibly partially populated.

use bytes::Bytes;
use futures_util::{pin_mut, SinkExt};
use std::fmt::Write as _;
use tokio_postgres::Client;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::ingest::provision::quote_ident;
use crate::ingest::sanitize::sanitize_row;
use crate::models::{Row, Value};

/// Stream `rows` into `schema.table`, returning the row count reported by
/// the server. With no rows the channel is never opened and 0 is returned,
/// so a zero-row run succeeds even when no table was provisioned.
pub async fn bulk_load(
    client: &Client,
    schema: &str,
    table: &str,
    columns: &[String],
    rows: Vec<Row>,
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let target = format!("{schema}.{table}");
    let err = |source| IngestError::Load {
        table: target.clone(),
        source,
    };

    let col_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let stmt = format!("COPY {schema}.{table} ({col_list}) FROM STDIN");
    debug!(table = %target, rows = rows.len(), "opening copy stream");

    let sink = client.copy_in::<_, Bytes>(stmt.as_str()).await.map_err(err)?;
    pin_mut!(sink);

    let mut line = String::new();
    for mut row in rows {
        sanitize_row(&mut row);
        line.clear();
        encode_row(&row, &mut line);
        sink.send(Bytes::copy_from_slice(line.as_bytes()))
            .await
            .map_err(err)?;
    }

    let written = sink.finish().await.map_err(err)?;
    debug!(table = %target, rows = written, "copy stream finished");
    Ok(written)
}

/// Encode one row as a COPY text line: tab-separated fields, newline
/// terminated.
pub fn encode_row(row: &Row, out: &mut String) {
    for (idx, field) in row.iter().enumerate() {
        if idx > 0 {
            out.push('\t');
        }
        encode_field(field, out);
    }
    out.push('\n');
}

fn encode_field(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("\\N"),
        Value::Bool(true) => out.push('t'),
        Value::Bool(false) => out.push('f'),
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        // Finite by the time it reaches the stream; sanitization ran first.
        Value::Float(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Text(s) => push_escaped(s, out),
        Value::Timestamp(ts) => {
            out.push_str(&ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        }
        Value::Date(d) => {
            let _ = write!(out, "{}", d.format("%Y-%m-%d"));
        }
        Value::Time(t) => {
            let _ = write!(out, "{}", t.format("%H:%M:%S%.6f"));
        }
        Value::Numeric(s) => push_escaped(s, out),
        Value::Bytes(b) => {
            // bytea hex input; the leading backslash itself needs escaping
            // inside COPY text.
            out.push_str("\\\\x");
            for byte in b {
                let _ = write!(out, "{byte:02x}");
            }
        }
    }
}

fn push_escaped(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    fn encode(row: Row) -> String {
        let mut out = String::new();
        encode_row(&row, &mut out);
        out
    }

    #[test]
    fn scalar_fields_encode_to_copy_text() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap();
        let line = encode(vec![
            Value::Int(42),
            Value::Float(3.5),
            Value::Bool(true),
            Value::Bool(false),
            Value::Null,
            Value::Timestamp(ts),
        ]);
        assert_eq!(line, "42\t3.5\tt\tf\t\\N\t2024-05-01T06:30:00.000000Z\n");
    }

    #[test]
    fn text_specials_are_escaped() {
        let line = encode(vec![Value::Text("a\tb\nc\\d\re".to_string())]);
        assert_eq!(line, "a\\tb\\nc\\\\d\\re\n");
    }

    #[test]
    fn date_time_and_numeric_forms() {
        let line = encode(vec![
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            Value::Time(NaiveTime::from_hms_milli_opt(23, 59, 59, 250).unwrap()),
            Value::Numeric("-123.450".to_string()),
        ]);
        assert_eq!(line, "2024-02-29\t23:59:59.250000\t-123.450\n");
    }

    #[test]
    fn bytes_encode_as_escaped_hex() {
        let line = encode(vec![Value::Bytes(vec![0x41, 0x00, 0xff])]);
        assert_eq!(line, "\\\\x4100ff\n");
    }

    #[test]
    fn non_finite_floats_are_nulled_before_encoding() {
        let mut row: Row = vec![Value::Float(f64::NAN), Value::Int(1)];
        sanitize_row(&mut row);
        assert_eq!(encode(row), "\\N\t1\n");
    }
}
