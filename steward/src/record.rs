//! Records
//!
//! A [`Record`] is a mapping from attribute name to value, materialized
//! from the backing store for permission evaluation, confirmation
//! rendering, and export. Values use `serde_json::Value` so nodes can
//! carry heterogeneous column types without a schema compiler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One row of a node's record set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Set a field value, returning the record for chaining
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Set a field value in place
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// Field names present on this record (unordered)
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// A field value rendered as plain text
    ///
    /// Strings render without quotes, null as the empty string, everything
    /// else through its JSON form.
    #[must_use]
    pub fn display_text(&self, field: &str) -> String {
        match self.values.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
