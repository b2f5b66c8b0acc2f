//! Pipeline run and check result types.

use rowflow_types::{JoinType, ValidationResult, ValidationStatus};

use crate::join::{JoinMetrics, JoinOutcome};

/// Per-input counters for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMetric {
    pub name: String,
    /// Rows the join step pulled from this input.
    pub rows_read: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub pipeline: String,
    pub join_type: JoinType,
    pub outcome: JoinOutcome,
    /// Enabled inputs in registration order.
    pub inputs: Vec<InputMetric>,
    pub rounds: u64,
    pub rows_emitted: u64,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub placeholders: u64,
    pub duration_secs: f64,
}

impl PipelineResult {
    pub(crate) fn new(
        pipeline: String,
        join_type: JoinType,
        outcome: JoinOutcome,
        metrics: &JoinMetrics,
        rows_written: u64,
        duration_secs: f64,
    ) -> Self {
        Self {
            pipeline,
            join_type,
            outcome,
            inputs: metrics
                .rows_read
                .iter()
                .map(|(name, rows)| InputMetric {
                    name: name.clone(),
                    rows_read: *rows,
                })
                .collect(),
            rounds: metrics.rounds,
            rows_emitted: metrics.rows_emitted,
            rows_written,
            rows_skipped: metrics.rows_skipped,
            placeholders: metrics.placeholders,
            duration_secs,
        }
    }

    /// Total rows pulled across every input.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.inputs.iter().map(|i| i.rows_read).sum()
    }
}

/// Result of a pipeline check.
#[derive(Debug)]
pub struct CheckResult {
    /// Registration of the join step against the declared layouts.
    pub join: ValidationResult,
    /// One entry per configured input, disabled ones included.
    pub inputs: Vec<(String, ValidationResult)>,
    pub output: ValidationResult,
}

impl CheckResult {
    /// `true` when no check failed. Warnings do not count as failures.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        std::iter::once(&self.join)
            .chain(self.inputs.iter().map(|(_, v)| v))
            .chain(std::iter::once(&self.output))
            .all(|v| v.status != ValidationStatus::Failed)
    }
}
