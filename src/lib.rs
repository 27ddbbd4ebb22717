//! Scheduled tabular ingest into PostgreSQL.
//!
//! Each pipeline ("model") pairs one extraction with one destination table.
//! The engine gates runs on a cron schedule backed by a persisted per-model
//! state record, infers destination column types from the extracted shape,
//! provisions the table for full-replace or incremental loads, and streams
//! rows in over the COPY protocol with non-finite floats nulled out.
//!
//! The typical entry point is [`run_ingest`] with an [`IngestJob`] and an
//! [`Extract`] implementation; binaries embedding several models can hang
//! them on a [`registry::ModelRegistry`].

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pg;
pub mod registry;
pub mod schedule;
pub mod source;
pub mod state;

pub use error::{IngestError, Result};
pub use ingest::{run_ingest, IngestJob};
pub use models::{ExtractionResult, ModelRunState, Row, RunReport, RunStatus, TableMode, Value};
pub use source::{Extract, ExtractContext, ExtractFn, QueryExtract};
