//! In-memory reference node
//!
//! [`MemoryNode`] keeps its record set in a `parking_lot`-guarded map
//! keyed by primary key. It backs tests, demos, and session-scoped admin
//! screens; production nodes implement [`Node`] over their own store.

use super::{Attribute, Node, NodeError, NodeSettings};
use crate::lock::LockMode;
use crate::record::Record;
use crate::selector::Selector;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// [`Node`] implementation over an in-memory record map
pub struct MemoryNode {
    settings: NodeSettings,
    attributes: Vec<Arc<dyn Attribute>>,
    rows: RwLock<BTreeMap<String, Record>>,
    cache_generation: AtomicU64,
}

impl MemoryNode {
    /// Start building a node over `table`
    #[must_use]
    pub fn builder(table: impl Into<String>) -> MemoryNodeBuilder {
        MemoryNodeBuilder {
            settings: NodeSettings::new(table),
            attributes: Vec::new(),
        }
    }

    /// Insert (or replace) a record, keyed by its primary key value
    ///
    /// # Errors
    ///
    /// [`NodeError::MissingKey`] when the record carries no value for the
    /// node's primary key.
    pub fn insert(&self, record: Record) -> Result<(), NodeError> {
        let key = record.display_text(&self.settings.primary_key);
        if key.is_empty() {
            return Err(NodeError::MissingKey(self.settings.primary_key.clone()));
        }
        self.rows.write().insert(key, record);
        Ok(())
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the node holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// How many times the result cache has been invalidated
    ///
    /// Observable seam for asserting cache behavior after mutations.
    #[must_use]
    pub fn cache_generation(&self) -> u64 {
        self.cache_generation.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNode")
            .field("settings", &self.settings)
            .field("rows", &self.rows.read().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MemoryNode`]
pub struct MemoryNodeBuilder {
    settings: NodeSettings,
    attributes: Vec<Arc<dyn Attribute>>,
}

impl MemoryNodeBuilder {
    /// Use a primary key other than `id`
    #[must_use]
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.settings.primary_key = field.into();
        self
    }

    /// Enable record locking with the given mode
    #[must_use]
    pub fn locking(mut self, mode: LockMode) -> Self {
        self.settings.locking = Some(mode);
        self
    }

    /// Add an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: impl Attribute + 'static) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    /// Add an already-shared attribute
    #[must_use]
    pub fn attribute_arc(mut self, attribute: Arc<dyn Attribute>) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> MemoryNode {
        MemoryNode {
            settings: self.settings,
            attributes: self.attributes,
            rows: RwLock::new(BTreeMap::new()),
            cache_generation: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Node for MemoryNode {
    fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.attributes.clone()
    }

    async fn select_candidates(&self, selector: &Selector) -> Result<Vec<Record>, NodeError> {
        let rows = self.rows.read();
        Ok(selector
            .ids()
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn select_all(&self) -> Result<Vec<Record>, NodeError> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn delete(&self, selector: &Selector) -> Result<(), NodeError> {
        {
            let rows = self.rows.read();
            for id in selector.ids() {
                if !rows.contains_key(id) {
                    return Err(NodeError::NotFound(id.clone()));
                }
            }
        }

        // Cascade before removing the parents, so a cascade failure
        // leaves the record set untouched
        for attribute in &self.attributes {
            if attribute.cascades_on_delete() {
                attribute.cascade_delete(selector).await?;
            }
        }

        let mut rows = self.rows.write();
        for id in selector.ids() {
            rows.remove(id);
        }
        Ok(())
    }

    fn invalidate_cache(&self) {
        self.cache_generation.fetch_add(1, Ordering::Relaxed);
    }
}
