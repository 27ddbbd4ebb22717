//! The extraction boundary.
//!
//! Each model supplies one "produce rows" capability; the engine never knows
//! what query or transform sits behind it. [`Extract`] is that seam.
//! [`QueryExtract`] is the stock implementation for the common case of one
//! SQL query against a PostgreSQL source.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use tokio_postgres::types::Type;
use tokio_postgres::Client;

use crate::config::Dsn;
use crate::error::{IngestError, Result};
use crate::models::{ExtractionResult, Row, Value};
use crate::pg;

/// Inputs forwarded verbatim to the extraction capability. `start` and `end`
/// are opaque date-boundary strings meaningful only to the model's query; no
/// date arithmetic happens on this side.
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    pub start: Option<String>,
    pub end: Option<String>,
    pub params: HashMap<String, String>,
}

/// A model's extraction capability.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, ctx: &ExtractContext) -> anyhow::Result<ExtractionResult>;
}

/// Adapter for plain async closures.
pub struct ExtractFn<F>(pub F);

#[async_trait]
impl<F, Fut> Extract for ExtractFn<F>
where
    F: Fn(ExtractContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ExtractionResult>> + Send,
{
    async fn extract(&self, ctx: &ExtractContext) -> anyhow::Result<ExtractionResult> {
        (self.0)(ctx.clone()).await
    }
}

/// One SQL query against a PostgreSQL source, yielding tuple rows. The
/// connection lives for a single extraction call.
pub struct QueryExtract {
    /// Name of the environment variable holding the source DSN.
    pub source_env: String,
    pub query: String,
}

#[async_trait]
impl Extract for QueryExtract {
    async fn extract(&self, _ctx: &ExtractContext) -> anyhow::Result<ExtractionResult> {
        let dsn = Dsn::from_env(&self.source_env)?;
        let client = pg::connect(&dsn).await?;
        let (columns, rows) = query_rows(&client, &self.query).await?;
        Ok(ExtractionResult::Rows { columns, rows })
    }
}

/// Run a query and map the result set into column names plus [`Value`] rows.
pub async fn query_rows(client: &Client, query: &str) -> Result<(Vec<String>, Vec<Row>)> {
    let pg_rows = client.query(query, &[]).await?;

    let columns: Vec<String> = match pg_rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::with_capacity(pg_rows.len());
    for pg_row in &pg_rows {
        let mut row = Vec::with_capacity(pg_row.columns().len());
        for idx in 0..pg_row.columns().len() {
            row.push(value_from_pg(pg_row, idx)?);
        }
        rows.push(row);
    }
    Ok((columns, rows))
}

/// Decode one result cell by its wire type. Types outside the supported set
/// fail the extraction rather than coercing silently.
fn value_from_pg(row: &tokio_postgres::Row, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let ty = column.type_();

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::Float)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(Value::Timestamp)
    } else if *ty == Type::TIMESTAMP {
        // Naive timestamps are taken as UTC.
        row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(|v| Value::Timestamp(v.and_utc()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<chrono::NaiveDate>>(idx)?.map(Value::Date)
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<chrono::NaiveTime>>(idx)?.map(Value::Time)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes)
    } else {
        return Err(IngestError::UnsupportedType {
            column: column.name().to_string(),
            ty: ty.name().to_string(),
        });
    };

    Ok(value.unwrap_or(Value::Null))
}
