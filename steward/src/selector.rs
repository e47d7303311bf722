//! Record selectors
//!
//! A [`Selector`] names one or more target records by opaque identifier.
//! Batch operations carry several identifiers; when matched against a
//! record set the identifiers combine with OR semantics. The sequence is
//! ordered and never empty, so callers never branch on a
//! one-vs-many distinction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a selector
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// A selector must name at least one record
    #[error("selector must name at least one record")]
    Empty,
}

/// An ordered, non-empty sequence of record identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Selector(Vec<String>);

impl Selector {
    /// Create a selector naming a single record
    #[must_use]
    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Create a selector from one or more identifiers
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::Empty`] if `ids` yields no identifiers.
    pub fn new<I, S>(ids: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self(ids))
    }

    /// The identifiers in order
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    /// Number of records named (always >= 1)
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with slice types
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `id` is one of the named identifiers
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|candidate| candidate == id)
    }

    /// Iterate the identifiers
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl TryFrom<Vec<String>> for Selector {
    type Error = SelectorError;

    fn try_from(ids: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<Selector> for Vec<String> {
    fn from(selector: Selector) -> Self {
        selector.0
    }
}

impl<'a> IntoIterator for &'a Selector {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
