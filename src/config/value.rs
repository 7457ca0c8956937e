//! Untyped configuration values, as produced by argv and file parsing.

use std::collections::BTreeMap;

/// Mapping from key to raw value. Backend sections nest as [`RawValue::Section`].
pub type RawConfig = BTreeMap<String, RawValue>;

/// A configuration value that has not been through a validator yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
    Section(RawConfig),
}

impl RawValue {
    pub fn as_section(&self) -> Option<&RawConfig> {
        match self {
            RawValue::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Coerce a scalar or list into a list of strings.
    ///
    /// Sections have no list form and yield an empty list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            RawValue::Bool(b) => vec![b.to_string()],
            RawValue::Str(s) => vec![s.clone()],
            RawValue::List(items) => items.clone(),
            RawValue::Section(_) => Vec::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Str(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Str(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        RawValue::List(value)
    }
}
