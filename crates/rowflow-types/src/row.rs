//! Fixed-arity rows.

use crate::layout::RowLayout;
use crate::value::Value;

/// Ordered tuple of values matching one [`RowLayout`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// All-NULL row shaped like `layout`.
    #[must_use]
    pub fn nulls(layout: &RowLayout) -> Self {
        Self(vec![Value::Null; layout.len()])
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Append a copy of `other`'s values.
    pub fn extend_from(&mut self, other: &Row) {
        self.0.extend_from_slice(&other.0);
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Build a [`Row`] from heterogeneous values.
///
/// ```
/// use rowflow_types::{row, Value};
/// let r = row![1_i64, "x", Value::Null];
/// assert_eq!(r.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    ($($v:expr),* $(,)?) => {
        $crate::row::Row::new(vec![$($crate::value::Value::from($v)),*])
    };
}
