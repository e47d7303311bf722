//! steward: node-driven CRUD admin actions for axum
//!
//! A node (entity descriptor + its attributes) drives server-side admin
//! actions against a relational backing store: CSRF-guarded delete
//! confirmation flows, pessimistic record locking, session-scoped scratch
//! stores, and delimited-text (CSV/Excel) export of record sets.
//!
//! # Design Principles
//!
//! 1. **Convention Over Configuration**: smart defaults for form field
//!    names, lock leases, and export formatting
//! 2. **Security by Default**: CSRF validation on every state-changing
//!    confirmation, all-or-nothing authorization over batch selectors
//! 3. **Explicit Collaborators**: authorization, locking, and transaction
//!    control are injected trait seams, never ambient global state
//! 4. **Type Safety Without Ceremony**: outcomes and terminal pages are
//!    values, not stringly-typed control flow
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use steward::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StewardConfig::load_for_service("my-admin")?;
//!     let state = StewardState::new(config);
//!
//!     // Describe an entity: table, attributes, locking policy
//!     let node = MemoryNode::builder("members")
//!         .attribute(FieldAttribute::new("name"))
//!         .attribute(FieldAttribute::new("email"))
//!         .locking(LockMode::Exclusive)
//!         .build();
//!     state.register_node(Arc::new(node));
//!
//!     // Ready-made routes: POST /{node}/delete, GET /{node}/export
//!     let app = steward::handlers::router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `postgres` - `PostgreSQL`-backed lock manager via sqlx (default)

#![allow(clippy::missing_errors_doc)] // TODO: Add comprehensive error docs before 1.0

pub mod config;
pub mod error;
pub mod export;
pub mod extractors;
pub mod handlers;
pub mod lock;
pub mod middleware;
pub mod node;
pub mod record;
pub mod selector;
pub mod session;
pub mod state;
pub mod workflow;

pub use error::StewardError;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use steward::prelude::*;
    //! ```

    pub use crate::config::StewardConfig;
    pub use crate::error::StewardError;
    pub use crate::export::{CsvExporter, ExportOutput, OutputParams};
    pub use crate::lock::{InMemoryLockManager, Lease, LockManager, LockMode};
    pub use crate::node::{
        Attribute, DeleteRule, FieldAttribute, ListAttribute, MemoryNode, Node, NodeError,
        NodeSettings, PageContent, RelationAttribute,
    };
    pub use crate::record::Record;
    pub use crate::selector::Selector;
    pub use crate::session::{CsrfToken, SessionData, SessionId, SessionRegistry};
    pub use crate::state::StewardState;
    pub use crate::workflow::{
        ActionOutcome, ActionRequest, ActionResponse, Authorizer, Backend, DeleteWorkflow,
        RenderContext,
    };
}
