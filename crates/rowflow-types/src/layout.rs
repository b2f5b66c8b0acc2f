//! Row layouts: ordered, named, typed field lists.

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

/// One field of a row layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Stream is sorted descending on this field when it is used as a key.
    #[serde(default)]
    pub descending: bool,
    /// String keys compare case-folded.
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            descending: false,
            case_insensitive: false,
        }
    }

    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// Ordered field list describing every row of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowLayout {
    fields: Vec<Field>,
}

impl RowLayout {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Ordinal of the first field named `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Append `other`'s fields. A name already present is renamed to
    /// `name_1`, `name_2`, ... using the first free suffix.
    pub fn merge(&mut self, other: &RowLayout) {
        for field in &other.fields {
            let mut field = field.clone();
            if self.index_of(&field.name).is_some() {
                let mut suffix = 1;
                let mut candidate = format!("{}_{suffix}", field.name);
                while self.index_of(&candidate).is_some() {
                    suffix += 1;
                    candidate = format!("{}_{suffix}", field.name);
                }
                field.name = candidate;
            }
            self.fields.push(field);
        }
    }
}

impl FromIterator<Field> for RowLayout {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
