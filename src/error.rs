//! Error types for the ingest engine.
//!
//! Each phase of a run (extract, provision, load, state tracking) has its own
//! variant so the controller can report exactly which phase failed while
//! still propagating the underlying fault unchanged.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing or malformed configuration, typically a DSN environment variable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed cron expression.
    #[error("invalid cron expression: {0}")]
    Cron(String),

    /// The model's extraction capability failed. Carries whatever error the
    /// collaborator produced, unchanged.
    #[error("extract phase failed: {0:#}")]
    Extract(anyhow::Error),

    /// DDL against the destination table failed.
    #[error("provision phase failed for {table}: {source}")]
    Provision {
        table: String,
        source: tokio_postgres::Error,
    },

    /// The COPY stream failed mid-transfer. The destination table may be
    /// partially populated; callers must not assume atomicity.
    #[error("load phase failed for {table}: {source}")]
    Load {
        table: String,
        source: tokio_postgres::Error,
    },

    /// The run state store could not be read or written.
    #[error("run state store error: {0}")]
    State(#[source] tokio_postgres::Error),

    /// Any other database-level failure.
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Columnar frame access failed.
    #[error("frame error: {0}")]
    Frame(#[from] polars::error::PolarsError),

    /// A frame value could not be represented as a row scalar.
    #[error("value conversion error: {0}")]
    Convert(String),

    /// A source result column has a wire type the reader does not handle.
    #[error("unsupported source column type {ty} for column \"{column}\"")]
    UnsupportedType { column: String, ty: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;
