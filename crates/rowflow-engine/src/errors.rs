//! Pipeline error model.

use rowflow_types::{ErrorCategory, StepError};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Error surfaced from a pipeline run.
///
/// `Step` wraps a typed `StepError` raised by the join step or an input
/// decoder. `Infrastructure` wraps opaque host-side errors (file I/O, task
/// join failures, channel setup).
#[derive(Debug)]
pub enum PipelineError {
    /// Typed step error.
    Step(StepError),
    /// Infrastructure error (I/O, worker panic, etc.)
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<StepError> for PipelineError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

impl PipelineError {
    /// Returns the typed step error if this is a `Step` variant.
    #[must_use]
    pub fn as_step_error(&self) -> Option<&StepError> {
        match self {
            Self::Step(e) => Some(e),
            Self::Infrastructure(_) => None,
        }
    }

    /// Returns `true` if the step rejected its configuration.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.as_step_error()
            .is_some_and(|e| e.category == ErrorCategory::Config)
    }
}
