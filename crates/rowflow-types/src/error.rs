//! Structured error model for step execution.
//!
//! [`StepError`] carries a classification, a stable code, and optional
//! diagnostic details. Construct via category-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a step error.
///
/// Every category is fatal to the step; there is no retry or error-row
/// redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid step configuration, detected before any row is processed.
    Config,
    /// Two key values of mutually incompatible kinds were compared.
    IncomparableKeys,
    /// Invalid or out-of-order input data.
    Data,
    /// Host-side plumbing failure (closed channel, poisoned state).
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::IncomparableKeys => "incomparable_keys",
            Self::Data => "data",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct StepError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StepError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Configuration error raised at stream registration.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, code, message)
    }

    /// Key comparison between incompatible scalar kinds.
    #[must_use]
    pub fn incomparable_keys(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IncomparableKeys, code, message)
    }

    /// Invalid input data.
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, code, message)
    }

    /// Internal host error.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns `true` for errors raised during stream registration.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.category == ErrorCategory::Config
    }
}

/// Validation check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
    Warning,
}

/// Result of a pre-run check on one pipeline component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationResult {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: ValidationStatus::Success,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Warning,
            message: message.into(),
        }
    }
}
