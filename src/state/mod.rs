//! Persisted run state, one row per model.
//!
//! `model_state` keeps the last outcome only: every write is an upsert keyed
//! on the model name, so history is depth-1 by design. Each call here is a
//! single short round-trip committed on its own; nothing holds a lock across
//! the schedule check and the outcome write.

use chrono::{DateTime, Utc};
use tokio_postgres::Client;

use crate::config::Dsn;
use crate::error::{IngestError, Result};
use crate::models::{ModelRunState, RunStatus};
use crate::pg;

const ENSURE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS model_state (
        model_name TEXT PRIMARY KEY,
        last_run TIMESTAMPTZ,
        status TEXT,
        rows_processed BIGINT,
        execution_time_seconds DOUBLE PRECISION,
        error TEXT,
        updated_at TIMESTAMPTZ DEFAULT NOW()
    )";

const UPSERT_SUCCESS: &str = "
    INSERT INTO model_state
        (model_name, last_run, status, rows_processed, execution_time_seconds, error)
    VALUES ($1, $2, $3, $4, $5, NULL)
    ON CONFLICT (model_name) DO UPDATE SET
        last_run = EXCLUDED.last_run,
        status = EXCLUDED.status,
        rows_processed = EXCLUDED.rows_processed,
        execution_time_seconds = EXCLUDED.execution_time_seconds,
        error = NULL,
        updated_at = NOW()";

const UPSERT_FAILURE: &str = "
    INSERT INTO model_state
        (model_name, last_run, status, rows_processed, execution_time_seconds, error)
    VALUES ($1, $2, $3, NULL, $4, $5)
    ON CONFLICT (model_name) DO UPDATE SET
        last_run = EXCLUDED.last_run,
        status = EXCLUDED.status,
        rows_processed = NULL,
        execution_time_seconds = EXCLUDED.execution_time_seconds,
        error = EXCLUDED.error,
        updated_at = NOW()";

/// Run state repository over one state-database connection.
pub struct StateStore {
    client: Client,
}

impl StateStore {
    /// Connect to the state database and make sure `model_state` exists.
    pub async fn connect(dsn: &Dsn) -> Result<Self> {
        let client = pg::connect(dsn).await?;
        let store = Self { client };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        self.client
            .execute(ENSURE_TABLE, &[])
            .await
            .map_err(IngestError::State)?;
        Ok(())
    }

    /// Timestamp of the model's last completed attempt, if any.
    pub async fn last_run(&self, model_name: &str) -> Result<Option<DateTime<Utc>>> {
        let row = self
            .client
            .query_opt(
                "SELECT last_run FROM model_state WHERE model_name = $1",
                &[&model_name],
            )
            .await
            .map_err(IngestError::State)?;
        match row {
            Some(row) => Ok(row.try_get(0).map_err(IngestError::State)?),
            None => Ok(None),
        }
    }

    /// The full persisted record for one model.
    pub async fn get(&self, model_name: &str) -> Result<Option<ModelRunState>> {
        let row = self
            .client
            .query_opt(
                "SELECT model_name, last_run, status, rows_processed,
                        execution_time_seconds, error, updated_at
                 FROM model_state WHERE model_name = $1",
                &[&model_name],
            )
            .await
            .map_err(IngestError::State)?;
        row.map(|r| row_to_state(&r)).transpose()
    }

    /// Every persisted record, ordered by model name.
    pub async fn all(&self) -> Result<Vec<ModelRunState>> {
        let rows = self
            .client
            .query(
                "SELECT model_name, last_run, status, rows_processed,
                        execution_time_seconds, error, updated_at
                 FROM model_state ORDER BY model_name",
                &[],
            )
            .await
            .map_err(IngestError::State)?;
        rows.iter().map(row_to_state).collect()
    }

    /// Record a successful run. Upserts; clears any previous error.
    pub async fn record_success(&self, model_name: &str, rows: i64, seconds: f64) -> Result<()> {
        let now = Utc::now();
        self.client
            .execute(
                UPSERT_SUCCESS,
                &[
                    &model_name,
                    &now,
                    &RunStatus::Success.as_str(),
                    &rows,
                    &seconds,
                ],
            )
            .await
            .map_err(IngestError::State)?;
        Ok(())
    }

    /// Record a failed run. Upserts; clears any previous row count.
    pub async fn record_failure(&self, model_name: &str, error: &str, seconds: f64) -> Result<()> {
        let now = Utc::now();
        self.client
            .execute(
                UPSERT_FAILURE,
                &[
                    &model_name,
                    &now,
                    &RunStatus::Failed.as_str(),
                    &seconds,
                    &error,
                ],
            )
            .await
            .map_err(IngestError::State)?;
        Ok(())
    }
}

fn row_to_state(row: &tokio_postgres::Row) -> Result<ModelRunState> {
    let status: Option<String> = row.try_get("status").map_err(IngestError::State)?;
    Ok(ModelRunState {
        model_name: row.try_get("model_name").map_err(IngestError::State)?,
        last_run: row.try_get("last_run").map_err(IngestError::State)?,
        status: status.and_then(|s| s.parse().ok()),
        rows_processed: row
            .try_get("rows_processed")
            .map_err(IngestError::State)?,
        execution_time_seconds: row
            .try_get("execution_time_seconds")
            .map_err(IngestError::State)?,
        error: row.try_get("error").map_err(IngestError::State)?,
        updated_at: row.try_get("updated_at").map_err(IngestError::State)?,
    })
}
