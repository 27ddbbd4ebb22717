//! Compiled-in model registry.
//!
//! Models are Rust values implementing [`Model`]; a binary registers the ones
//! it ships and selects them by exact name or shell-style wildcard, the same
//! way operators address them from schedulers.

use async_trait::async_trait;
use regex::Regex;
use tracing::{error, info};

use crate::error::Result;
use crate::models::RunReport;

/// One pipeline definition: an extraction paired with a destination table.
#[async_trait]
pub trait Model: Send + Sync {
    /// Stable model name, conventionally the destination table identifier.
    fn name(&self) -> &str;

    /// Execute the model end to end.
    async fn run(&self) -> Result<RunReport>;
}

/// Totals from running a selection of models.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Registered models, selectable by name or pattern.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<Box<dyn Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Box<dyn Model>) {
        self.models.push(model);
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names
    }

    /// Models matching `pattern`. A pattern without wildcards selects by
    /// exact name.
    pub fn select(&self, pattern: &str) -> Vec<&dyn Model> {
        if pattern.contains('*') || pattern.contains('?') {
            let re = wildcard_regex(pattern);
            self.models
                .iter()
                .filter(|m| re.is_match(m.name()))
                .map(|m| m.as_ref())
                .collect()
        } else {
            self.models
                .iter()
                .filter(|m| m.name() == pattern)
                .map(|m| m.as_ref())
                .collect()
        }
    }

    /// Run every model matching `pattern`, in registration order. A model's
    /// failure is logged and counted but does not stop the remaining models.
    pub async fn run_pattern(&self, pattern: &str) -> RunSummary {
        let mut summary = RunSummary::default();
        for model in self.select(pattern) {
            match model.run().await {
                Ok(report) => {
                    info!(model = model.name(), rows = report.rows, "model completed");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(model = model.name(), error = %e, "model failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

/// Translate a shell-style wildcard (`*`, `?`) into an anchored regex.
fn wildcard_regex(pattern: &str) -> Regex {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    // The escaped pattern is always a valid expression.
    Regex::new(&re).expect("escaped wildcard pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunReport;

    struct StubModel {
        name: &'static str,
    }

    #[async_trait]
    impl Model for StubModel {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> Result<RunReport> {
            Ok(RunReport {
                rows: 1,
                exec_time: 0.0,
                write_time: 0.0,
                total_time: 0.0,
            })
        }
    }

    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        for name in ["rk_dim_suppliers", "rk_fact_invoices", "ar_history"] {
            reg.register(Box::new(StubModel { name }));
        }
        reg
    }

    #[test]
    fn exact_name_selects_one() {
        let reg = registry();
        let hits = reg.select("ar_history");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name(), "ar_history");
        assert!(reg.select("missing").is_empty());
    }

    #[test]
    fn wildcards_match_shell_style() {
        let reg = registry();
        assert_eq!(reg.select("rk_*").len(), 2);
        assert_eq!(reg.select("*invoices").len(), 1);
        assert_eq!(reg.select("ar_histor?").len(), 1);
        // Dots and other regex metacharacters are literal.
        assert!(reg.select("ar.history").is_empty());
    }

    #[tokio::test]
    async fn run_pattern_counts_outcomes() {
        let reg = registry();
        let summary = reg.run_pattern("rk_*").await;
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.all_ok());
    }
}
