//! Scalar values carried in rows.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared kind of a field in a row layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Number,
    Decimal,
    String,
    Timestamp,
    Binary,
    Boolean,
}

impl ValueKind {
    /// Integer, floating point and decimal kinds compare with each other.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number | Self::Decimal)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar value. `Null` is valid for every kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Number(f64),
    Decimal(BigDecimal),
    String(String),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
    Boolean(bool),
}

impl Value {
    /// Kind of a non-null value; `None` for `Null`.
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Number(_) => Some(ValueKind::Number),
            Self::Decimal(_) => Some(ValueKind::Decimal),
            Self::String(_) => Some(ValueKind::String),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
            Self::Binary(_) => Some(ValueKind::Binary),
            Self::Boolean(_) => Some(ValueKind::Boolean),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short description used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::as_str)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_of_each_variant() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::from(1_i64).kind(), Some(ValueKind::Integer));
        assert_eq!(Value::from("a").kind(), Some(ValueKind::String));
        assert_eq!(Value::from(vec![1_u8]).kind(), Some(ValueKind::Binary));
    }

    #[test]
    fn numeric_kinds() {
        assert!(ValueKind::Integer.is_numeric());
        assert!(ValueKind::Decimal.is_numeric());
        assert!(!ValueKind::String.is_numeric());
        assert!(!ValueKind::Boolean.is_numeric());
    }

    #[test]
    fn option_none_is_null() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        assert_eq!(v.to_string(), "NULL");
    }

    #[test]
    fn kind_serde_names() {
        let kind: ValueKind = serde_json::from_str("\"timestamp\"").unwrap();
        assert_eq!(kind, ValueKind::Timestamp);
        assert_eq!(serde_json::to_string(&ValueKind::Decimal).unwrap(), "\"decimal\"");
    }
}
