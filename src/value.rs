use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FieldKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0)
    }
}

/// The value a field, group, adapter, or form carries. Field values in a
/// template are declared with one of these variants; composite entities
/// always produce `Map`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Empty,
    Text(String),
    Flag(bool),
    Number(Decimal),
    List(Vec<FieldValue>),
    Map(BTreeMap<FieldKey, FieldValue>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn flag(value: bool) -> Self {
        FieldValue::Flag(value)
    }

    pub fn number(value: Decimal) -> Self {
        FieldValue::Number(value)
    }

    pub fn list(values: impl IntoIterator<Item = FieldValue>) -> Self {
        FieldValue::List(values.into_iter().collect())
    }

    pub fn map(entries: impl IntoIterator<Item = (FieldKey, FieldValue)>) -> Self {
        FieldValue::Map(entries.into_iter().collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<FieldKey, FieldValue>> {
        match self {
            FieldValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// A copy with leading and trailing whitespace removed from text.
    /// Identity for every other variant.
    pub fn trimmed(&self) -> FieldValue {
        match self {
            FieldValue::Text(value) => FieldValue::Text(value.trim().to_string()),
            other => other.clone(),
        }
    }

    /// Empty, or text that trims to nothing. Used by `Validator::required`.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Empty
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}
