//! Cron-gated run admission.
//!
//! A model with a schedule only executes once its cron expression has come
//! due since the last recorded run. The decision itself is pure
//! ([`evaluate`]); [`CronGate`] binds it to the persisted run state. The gate
//! read and the later outcome upsert are two separate round-trips with no
//! lock held between them, so two processes started concurrently for one model
//! can both observe "due". Operating single-writer-per-model is assumed.

pub mod cron;

use chrono::{DateTime, Utc};

pub use cron::CronExpr;

use crate::error::Result;
use crate::state::StateStore;

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The model should run now. `last_run` is None on first-run bootstrap.
    Due { last_run: Option<DateTime<Utc>> },
    /// The model already ran this period.
    NotDue {
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    },
}

/// Pure gate decision: no prior run is always due; otherwise the model is
/// due once `now` reaches the first scheduled instant after `last_run`.
pub fn evaluate(
    expr: &CronExpr,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<GateDecision> {
    match last_run {
        None => Ok(GateDecision::Due { last_run: None }),
        Some(last_run) => {
            let next_run = expr.next_after(last_run)?;
            if now >= next_run {
                Ok(GateDecision::Due {
                    last_run: Some(last_run),
                })
            } else {
                Ok(GateDecision::NotDue { last_run, next_run })
            }
        }
    }
}

/// Schedule gate for one model, backed by the run state store.
pub struct CronGate {
    model_name: String,
    expr: CronExpr,
}

impl CronGate {
    /// Parse the expression up front so malformed schedules fail before any
    /// extraction work starts.
    pub fn new(model_name: impl Into<String>, expr: &str) -> Result<Self> {
        Ok(Self {
            model_name: model_name.into(),
            expr: CronExpr::parse(expr)?,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Read the model's last run and evaluate the schedule against `now`.
    pub async fn decide(&self, store: &StateStore, now: DateTime<Utc>) -> Result<GateDecision> {
        let last_run = store.last_run(&self.model_name).await?;
        evaluate(&self.expr, last_run, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn no_prior_state_is_always_due() {
        for expr in ["0 6 * * *", "*/5 * * * *", "0 0 1 1 *"] {
            let cron = CronExpr::parse(expr).unwrap();
            let decision = evaluate(&cron, None, utc(2024, 5, 1, 0, 0)).unwrap();
            assert_eq!(decision, GateDecision::Due { last_run: None });
        }
    }

    #[test]
    fn daily_schedule_boundary() {
        let cron = CronExpr::parse("0 6 * * *").unwrap();
        let last_run = utc(2024, 5, 1, 6, 0);

        // 05:59 next day: not due.
        let decision = evaluate(&cron, Some(last_run), utc(2024, 5, 2, 5, 59)).unwrap();
        assert_eq!(
            decision,
            GateDecision::NotDue {
                last_run,
                next_run: utc(2024, 5, 2, 6, 0),
            }
        );

        // 06:00 sharp: due.
        let decision = evaluate(&cron, Some(last_run), utc(2024, 5, 2, 6, 0)).unwrap();
        assert_eq!(
            decision,
            GateDecision::Due {
                last_run: Some(last_run)
            }
        );

        // Well past: still due.
        let decision = evaluate(&cron, Some(last_run), utc(2024, 5, 3, 12, 0)).unwrap();
        assert!(matches!(decision, GateDecision::Due { .. }));
    }

    #[test]
    fn off_schedule_last_run_rolls_to_next_instant() {
        let cron = CronExpr::parse("0 6 * * *").unwrap();
        // A forced run at 14:20 pushes the next due instant to tomorrow 06:00.
        let last_run = utc(2024, 5, 1, 14, 20);
        let decision = evaluate(&cron, Some(last_run), utc(2024, 5, 1, 23, 0)).unwrap();
        assert_eq!(
            decision,
            GateDecision::NotDue {
                last_run,
                next_run: utc(2024, 5, 2, 6, 0),
            }
        );
    }

    #[test]
    fn malformed_expression_fails_construction() {
        assert!(CronGate::new("finance.invoices", "not a cron").is_err());
    }
}
