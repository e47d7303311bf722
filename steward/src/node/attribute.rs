//! Attributes
//!
//! An [`Attribute`] is a named, typed capability of a node. Variants
//! differ by storage (plain field, enumerated list, detail relation) but
//! share one contract: a delete-veto check, optional cascade-delete
//! behavior, and export formatting.

use super::NodeError;
use crate::selector::Selector;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Capability contract every node attribute implements
#[async_trait]
pub trait Attribute: Send + Sync {
    /// The underlying field name
    fn field_name(&self) -> &str;

    /// Localized display label
    fn label(&self) -> String {
        self.field_name().to_string()
    }

    /// Whether deleting the records a selector names is permitted
    ///
    /// # Errors
    ///
    /// A human-readable denial reason when this attribute vetoes the
    /// delete; the workflow stops at the first veto.
    fn delete_allowed(&self, _selector: &Selector) -> Result<(), String> {
        Ok(())
    }

    /// Whether [`Attribute::cascade_delete`] must run when the owning
    /// records are deleted
    fn cascades_on_delete(&self) -> bool {
        false
    }

    /// Remove dependent data for the records a selector names
    async fn cascade_delete(&self, _selector: &Selector) -> Result<(), NodeError> {
        Ok(())
    }

    /// Format a stored value for export
    ///
    /// `decode` selects display formatting over the raw stored text,
    /// for attributes that distinguish the two.
    fn export_value(&self, value: &Value, _decode: bool) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A plain stored field with no delete behavior of its own
#[derive(Debug, Clone)]
pub struct FieldAttribute {
    name: String,
    label: Option<String>,
}

impl FieldAttribute {
    /// Create a field attribute
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    /// Override the display label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl Attribute for FieldAttribute {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// A field storing one key of a fixed (key, display text) option list
///
/// With `decode` the export shows the display text instead of the key.
#[derive(Debug, Clone)]
pub struct ListAttribute {
    name: String,
    label: Option<String>,
    options: Vec<(String, String)>,
}

impl ListAttribute {
    /// Create a list attribute over (stored key, display text) options
    #[must_use]
    pub fn new<I, K, D>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            label: None,
            options: options
                .into_iter()
                .map(|(key, display)| (key.into(), display.into()))
                .collect(),
        }
    }

    /// Override the display label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl Attribute for ListAttribute {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }

    fn export_value(&self, value: &Value, decode: bool) -> String {
        let raw = match value {
            Value::Null => return String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if decode {
            self.options
                .iter()
                .find(|(key, _)| *key == raw)
                .map_or(raw, |(_, display)| display.clone())
        } else {
            raw
        }
    }
}

/// What a relation does with its dependent rows when a parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRule {
    /// Delete the dependent rows along with the parent
    Cascade,
    /// Veto the parent delete while dependent rows exist
    Restrict,
}

/// A one-to-many detail relation holding dependent rows per parent record
///
/// The bundled in-memory counterpart to a foreign-keyed detail table:
/// rows are grouped by parent identifier, and the configured
/// [`DeleteRule`] decides between cascading and vetoing.
pub struct RelationAttribute {
    name: String,
    label: Option<String>,
    rule: DeleteRule,
    children: RwLock<HashMap<String, Vec<Value>>>,
}

impl RelationAttribute {
    /// Create a relation attribute with the given delete rule
    #[must_use]
    pub fn new(name: impl Into<String>, rule: DeleteRule) -> Self {
        Self {
            name: name.into(),
            label: None,
            rule,
            children: RwLock::new(HashMap::new()),
        }
    }

    /// Override the display label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a dependent row to a parent record
    pub fn add_child(&self, parent_id: impl Into<String>, row: Value) {
        self.children
            .write()
            .entry(parent_id.into())
            .or_default()
            .push(row);
    }

    /// Dependent row count for a parent record
    #[must_use]
    pub fn child_count(&self, parent_id: &str) -> usize {
        self.children.read().get(parent_id).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for RelationAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationAttribute")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Attribute for RelationAttribute {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }

    fn delete_allowed(&self, selector: &Selector) -> Result<(), String> {
        if self.rule == DeleteRule::Restrict {
            let children = self.children.read();
            for id in selector.ids() {
                let count = children.get(id).map_or(0, Vec::len);
                if count > 0 {
                    return Err(format!(
                        "{count} dependent record(s) still reference record {id}"
                    ));
                }
            }
        }
        Ok(())
    }

    fn cascades_on_delete(&self) -> bool {
        self.rule == DeleteRule::Cascade
    }

    async fn cascade_delete(&self, selector: &Selector) -> Result<(), NodeError> {
        let mut children = self.children.write();
        for id in selector.ids() {
            children.remove(id);
        }
        Ok(())
    }

    fn export_value(&self, value: &Value, _decode: bool) -> String {
        // Relations export the parent-side value as-is; dependent rows
        // belong to their own node's export
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
