//! Shared rowflow value, row, layout and error model types.
//!
//! Kept free of runtime dependencies so hosts, steps and tests can share them.

pub mod error;
pub mod join;
pub mod layout;
pub mod row;
pub mod value;

pub use error::{ErrorCategory, StepError, ValidationResult, ValidationStatus};
pub use join::{JoinType, MergeJoinSettings};
pub use layout::{Field, RowLayout};
pub use row::Row;
pub use value::{Value, ValueKind};
