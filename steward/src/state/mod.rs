//! Application state
//!
//! [`StewardState`] bundles the registered nodes, the collaborator seams
//! (lock manager, transaction backend, authorizer), the session registry,
//! and configuration. It is cheap to clone and is the axum router state.

use crate::config::StewardConfig;
use crate::lock::{InMemoryLockManager, LockManager};
use crate::node::Node;
use crate::session::SessionRegistry;
use crate::workflow::{AllowAll, AutoCommit, Authorizer, Backend, DeleteWorkflow};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct StateInner {
    config: StewardConfig,
    nodes: RwLock<HashMap<String, Arc<dyn Node>>>,
    locks: Arc<dyn LockManager>,
    backend: Arc<dyn Backend>,
    authorizer: Arc<dyn Authorizer>,
    sessions: SessionRegistry,
}

/// Shared application state for the admin toolkit
#[derive(Clone)]
pub struct StewardState {
    inner: Arc<StateInner>,
}

impl StewardState {
    /// Create state with the default collaborators: an in-memory lock
    /// manager, a no-op transaction backend, and allow-all authorization
    #[must_use]
    pub fn new(config: StewardConfig) -> Self {
        let locks = Arc::new(InMemoryLockManager::with_ttl_secs(
            config.locking.lease_ttl_secs,
        ));
        Self::with_collaborators(config, locks, Arc::new(AutoCommit), Arc::new(AllowAll))
    }

    /// Create state with explicit collaborators
    #[must_use]
    pub fn with_collaborators(
        config: StewardConfig,
        locks: Arc<dyn LockManager>,
        backend: Arc<dyn Backend>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                nodes: RwLock::new(HashMap::new()),
                locks,
                backend,
                authorizer,
                sessions: SessionRegistry::new(),
            }),
        }
    }

    /// Register a node under its table name
    pub fn register_node(&self, node: Arc<dyn Node>) {
        let name = node.settings().table.clone();
        self.inner.nodes.write().insert(name, node);
    }

    /// Look up a registered node
    #[must_use]
    pub fn node(&self, name: &str) -> Option<Arc<dyn Node>> {
        self.inner.nodes.read().get(name).cloned()
    }

    /// The loaded configuration
    #[must_use]
    pub fn config(&self) -> &StewardConfig {
        &self.inner.config
    }

    /// The session registry backing the session middleware
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// The lock manager
    #[must_use]
    pub fn locks(&self) -> Arc<dyn LockManager> {
        self.inner.locks.clone()
    }

    /// Build the delete workflow for a node, wired to this state's
    /// collaborators and configuration
    #[must_use]
    pub fn delete_workflow(&self, node: Arc<dyn Node>) -> DeleteWorkflow {
        DeleteWorkflow::new(
            node,
            self.inner.authorizer.clone(),
            self.inner.locks.clone(),
            self.inner.backend.clone(),
        )
        .with_config(&self.inner.config)
    }
}

impl std::fmt::Debug for StewardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StewardState")
            .field("nodes", &self.inner.nodes.read().len())
            .field("sessions", &self.inner.sessions.len())
            .finish_non_exhaustive()
    }
}
