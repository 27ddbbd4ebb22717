//! Domain types shared across the ingest engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;

/// How the destination table is treated on each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// Drop and recreate the destination table; data is fully replaced.
    Full,
    /// Create the destination table if absent and append; never drop.
    Incremental,
}

impl TableMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableMode::Full => "full",
            TableMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "replace" and "append" are the legacy spellings.
        match s.to_ascii_lowercase().as_str() {
            "full" | "replace" => Ok(TableMode::Full),
            "incremental" | "append" => Ok(TableMode::Incremental),
            other => Err(format!("unknown table mode: {other}")),
        }
    }
}

/// A single extracted scalar. This is the closed set the sanitizer, type
/// inferencer, and bulk loader dispatch on.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Arbitrary-precision numeric, carried in its text form.
    Numeric(String),
    Bytes(Vec<u8>),
}

/// One extracted row, positionally aligned to its column names.
pub type Row = Vec<Value>;

/// What a model's extraction capability returns: plain tuples with column
/// names, or a columnar frame that carries its own names and dtypes.
#[derive(Debug)]
pub enum ExtractionResult {
    Rows { columns: Vec<String>, rows: Vec<Row> },
    Frame(DataFrame),
}

/// Terminal status of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Timing and row-count totals returned by a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Rows produced by the extraction (and offered to the loader).
    pub rows: u64,
    /// Extraction phase duration, seconds.
    pub exec_time: f64,
    /// Provision + load phase duration, seconds.
    pub write_time: f64,
    /// Full wall-clock duration, seconds.
    pub total_time: f64,
}

/// The persisted last-outcome record for one model, as stored in
/// `model_state`. At most one row exists per model name.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRunState {
    pub model_name: String,
    pub last_run: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
    pub rows_processed: Option<i64>,
    pub execution_time_seconds: Option<f64>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_mode_parses_current_and_legacy_spellings() {
        assert_eq!("full".parse::<TableMode>().unwrap(), TableMode::Full);
        assert_eq!("replace".parse::<TableMode>().unwrap(), TableMode::Full);
        assert_eq!(
            "incremental".parse::<TableMode>().unwrap(),
            TableMode::Incremental
        );
        assert_eq!("append".parse::<TableMode>().unwrap(), TableMode::Incremental);
        assert!("upsert".parse::<TableMode>().is_err());
    }

    #[test]
    fn run_status_round_trips() {
        assert_eq!("success".parse::<RunStatus>().unwrap(), RunStatus::Success);
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert_eq!(RunStatus::Success.as_str(), "success");
    }
}
