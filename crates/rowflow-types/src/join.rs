//! Join type selector and the persisted merge-join step settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Join mode of the merge-join step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Emit only keys present in every stream.
    Inner,
    /// Emit every key present in at least one stream.
    FullOuter,
}

impl JoinType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::FullOuter => "FULL OUTER",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinType {
    type Err = StepError;

    /// Accepts `INNER` and `FULL OUTER`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("INNER") {
            Ok(Self::Inner)
        } else if trimmed.eq_ignore_ascii_case("FULL OUTER") {
            Ok(Self::FullOuter)
        } else {
            Err(StepError::config(
                "UNKNOWN_JOIN_TYPE",
                format!("join type '{s}' is not one of INNER, FULL OUTER"),
            ))
        }
    }
}

/// Logical settings of one merge-join step: stream names, per-stream
/// comma-separated key lists (positionally aligned), and the join type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeJoinSettings {
    pub streams: Vec<String>,
    pub keys: Vec<String>,
    pub join_type: String,
}

impl MergeJoinSettings {
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

/// Split a comma-separated key list into trimmed field names.
#[must_use]
pub fn split_key_list(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
