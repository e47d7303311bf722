//! Nodes
//!
//! A [`Node`] is the entity descriptor at the heart of the toolkit: it
//! combines schema (a set of [`Attribute`]s), persistence operations over
//! a backing store, and the page hooks admin actions render through.
//! Handlers and workflows only ever see the trait; [`MemoryNode`] is the
//! bundled reference implementation.

mod attribute;
mod memory;

pub use attribute::{Attribute, DeleteRule, FieldAttribute, ListAttribute, RelationAttribute};
pub use memory::{MemoryNode, MemoryNodeBuilder};

use crate::lock::LockMode;
use crate::selector::Selector;
use crate::record::Record;
use crate::workflow::{ActionOutcome, RenderContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Node persistence errors
#[derive(Debug, Error)]
pub enum NodeError {
    /// A selector named a record that does not exist
    #[error("record {0} not found")]
    NotFound(String),

    /// A record is missing its primary key value
    #[error("record has no value for primary key {0}")]
    MissingKey(String),

    /// The backing store failed
    #[error("storage error: {0}")]
    Storage(String),

    /// An attribute's cascade delete failed
    #[error("cascade delete failed for {attribute}: {message}")]
    Cascade {
        /// The attribute whose cascade failed
        attribute: String,
        /// Backend detail
        message: String,
    },
}

/// Static settings of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Backing table (also the node's route name)
    pub table: String,
    /// Field holding the record identifier selectors match against
    pub primary_key: String,
    /// Lock mode when record locking is enabled for this node
    pub locking: Option<LockMode>,
}

impl NodeSettings {
    /// Settings for a table with primary key `id` and locking disabled
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            locking: None,
        }
    }
}

/// Opaque page payload for the terminal non-redirect responses
///
/// HTML rendering is the embedding application's concern; nodes hand back
/// plain title/body text the response layer emits as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Page title
    pub title: String,
    /// Page body text
    pub body: String,
}

/// Entity descriptor: schema, persistence, and page hooks for one record type
#[async_trait]
pub trait Node: Send + Sync {
    /// The node's static settings
    fn settings(&self) -> &NodeSettings;

    /// The node's attributes, in declaration order
    fn attributes(&self) -> Vec<Arc<dyn Attribute>>;

    /// Fetch the records a selector names (identifiers OR-combined)
    ///
    /// Identifiers naming no record are simply absent from the result;
    /// callers needing existence guarantees check afterwards.
    async fn select_candidates(&self, selector: &Selector) -> Result<Vec<Record>, NodeError>;

    /// Fetch the node's whole record set, ordered by primary key
    async fn select_all(&self) -> Result<Vec<Record>, NodeError>;

    /// Delete the records a selector names, cascading through every
    /// attribute flagged for cascade delete
    ///
    /// All-or-nothing: a missing record fails the whole call.
    async fn delete(&self, selector: &Selector) -> Result<(), NodeError>;

    /// Invalidate any cached result sets after a successful mutation
    fn invalidate_cache(&self) {}

    /// Redirect target encoding a completed action and its outcome
    fn feedback_url(
        &self,
        action: &str,
        outcome: ActionOutcome,
        detail: Option<&str>,
    ) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("action", action);
        query.append_pair("outcome", outcome.as_str());
        if let Some(detail) = detail {
            query.append_pair("detail", detail);
        }
        format!("/{}/feedback?{}", self.settings().table, query.finish())
    }

    /// Page asking the user to confirm a pending delete
    fn confirmation_page(&self, ctx: &RenderContext) -> PageContent {
        let noun = if ctx.selector.len() == 1 {
            "record"
        } else {
            "records"
        };
        PageContent {
            title: format!("Confirm delete: {}", self.settings().table),
            body: format!(
                "Are you sure you want to delete {} {noun} ({})?",
                ctx.selector.len(),
                ctx.selector
            ),
        }
    }

    /// Page shown when a record in the selection is locked by another session
    fn locked_page(&self) -> PageContent {
        PageContent {
            title: format!("Record locked: {}", self.settings().table),
            body: "The selected record is being edited by someone else. Try again later."
                .to_string(),
        }
    }
}
