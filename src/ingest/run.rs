//! The ingest run controller.
//!
//! One invocation walks PENDING → (gate check) → EXECUTING → SUCCEEDED or
//! FAILED. A gated model that is not due transitions to SKIPPED instead and
//! the process exits with a success status; the prior state already says
//! everything there is to say. Failures are recorded in the run state (when
//! gated) and then propagated unchanged; nothing is swallowed here.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use polars::prelude::DataType;
use tracing::{info, warn};

use crate::config::{self, Dsn};
use crate::error::{IngestError, Result};
use crate::ingest::{frame, loader, provision, typemap};
use crate::models::{ExtractionResult, RunReport, Row, TableMode};
use crate::pg;
use crate::schedule::{CronGate, GateDecision};
use crate::source::{Extract, ExtractContext};
use crate::state::StateStore;

/// Everything one model invocation needs, besides the extraction capability
/// itself.
#[derive(Debug, Clone)]
pub struct IngestJob {
    /// Name of the environment variable holding the destination DSN.
    pub dest_env: String,
    /// Dotted destination identifier; doubles as the model name in run state.
    pub dest_table: String,
    pub mode: TableMode,
    /// Five-field cron expression. None disables gating and state tracking.
    pub schedule: Option<String>,
    /// Opaque date-range boundaries, forwarded to the extraction capability.
    pub start: Option<String>,
    pub end: Option<String>,
    /// Run even if the schedule says the model is not due.
    pub force: bool,
    pub verbose: bool,
    /// Explicit destination types by column name; wins over inference.
    pub col_types: Option<HashMap<String, String>>,
    /// Arbitrary pass-through parameters for the extraction capability.
    pub params: HashMap<String, String>,
}

impl IngestJob {
    pub fn new(dest_env: impl Into<String>, dest_table: impl Into<String>) -> Self {
        Self {
            dest_env: dest_env.into(),
            dest_table: dest_table.into(),
            mode: TableMode::Full,
            schedule: None,
            start: None,
            end: None,
            force: false,
            verbose: true,
            col_types: None,
            params: HashMap::new(),
        }
    }
}

/// Run one model end to end: gate, extract, provision, load, record.
///
/// When the job carries a schedule and the model is not yet due, this logs a
/// neutral "skipped" line and **terminates the process** with exit status 0.
/// Callers needing a pure decision should use [`crate::schedule::evaluate`].
pub async fn run_ingest(job: &IngestJob, extract: &dyn Extract) -> Result<RunReport> {
    let tracker = match &job.schedule {
        Some(expr) => Some(check_gate(job, expr).await?),
        None => None,
    };

    let total_timer = Instant::now();
    let outcome = execute_and_load(job, extract).await;
    let total_time = total_timer.elapsed().as_secs_f64();

    match outcome {
        Ok((rows, exec_time, write_time)) => {
            let report = RunReport {
                rows,
                exec_time,
                write_time,
                total_time,
            };
            if job.verbose {
                info!(
                    model = %job.dest_table,
                    rows,
                    total_secs = total_time,
                    "run complete"
                );
            }
            if let Some(store) = &tracker {
                store
                    .record_success(&job.dest_table, rows as i64, total_time)
                    .await?;
            }
            Ok(report)
        }
        Err(e) => {
            if let Some(store) = &tracker {
                // The original fault wins; a second failure while recording
                // it is only worth a warning.
                if let Err(state_err) = store
                    .record_failure(&job.dest_table, &e.to_string(), total_time)
                    .await
                {
                    warn!(error = %state_err, "could not record failure state");
                }
            }
            Err(e)
        }
    }
}

/// Connect the state store and apply the schedule gate. Exits the process on
/// a not-due decision unless the job is forced.
async fn check_gate(job: &IngestJob, expr: &str) -> Result<StateStore> {
    let store = StateStore::connect(&config::state_dsn()?).await?;
    let gate = CronGate::new(job.dest_table.clone(), expr)?;

    if job.force {
        info!(model = %job.dest_table, "forced run, schedule bypassed");
        return Ok(store);
    }

    match gate.decide(&store, Utc::now()).await? {
        GateDecision::Due { last_run: None } => {
            info!(model = %job.dest_table, "starting (first run)");
        }
        GateDecision::Due {
            last_run: Some(last_run),
        } => {
            info!(model = %job.dest_table, %last_run, "starting");
        }
        GateDecision::NotDue { last_run, next_run } => {
            info!(
                model = %job.dest_table,
                %last_run,
                %next_run,
                "not due yet, skipping"
            );
            std::process::exit(0);
        }
    }
    Ok(store)
}

/// The EXECUTING phase: extraction, normalization, provisioning, load.
/// Returns (row count, exec seconds, write seconds).
async fn execute_and_load(job: &IngestJob, extract: &dyn Extract) -> Result<(u64, f64, f64)> {
    let (schema, table) = provision::parse_table(&job.dest_table);

    if job.verbose {
        info!(
            model = %job.dest_table,
            start = job.start.as_deref().unwrap_or("-"),
            end = job.end.as_deref().unwrap_or("-"),
            "executing extraction"
        );
    }

    let exec_timer = Instant::now();
    let ctx = ExtractContext {
        start: job.start.clone(),
        end: job.end.clone(),
        params: job.params.clone(),
    };
    let result = extract
        .extract(&ctx)
        .await
        .map_err(IngestError::Extract)?;

    let (columns, dtypes, rows): (Vec<String>, Option<Vec<DataType>>, Vec<Row>) = match result {
        ExtractionResult::Rows { columns, rows } => (columns, None, rows),
        ExtractionResult::Frame(df) => {
            let columns = frame::column_names(&df);
            let dtypes = frame::dtypes(&df);
            let rows = frame::materialize(&df)?;
            (columns, Some(dtypes), rows)
        }
    };
    let exec_time = exec_timer.elapsed().as_secs_f64();
    let row_count = rows.len() as u64;

    if job.verbose {
        info!(
            model = %job.dest_table,
            rows = row_count,
            exec_secs = exec_time,
            "extraction complete, writing"
        );
    }

    let write_timer = Instant::now();
    let dest = pg::connect(&Dsn::from_env(&job.dest_env)?).await?;
    let defs = typemap::column_defs(
        &columns,
        rows.first(),
        dtypes.as_deref(),
        job.col_types.as_ref(),
    );
    provision::provision(&dest, job.mode, &schema, &table, &defs).await?;
    loader::bulk_load(&dest, &schema, &table, &columns, rows).await?;
    let write_time = write_timer.elapsed().as_secs_f64();

    Ok((row_count, exec_time, write_time))
}
