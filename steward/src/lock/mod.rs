//! Record locking
//!
//! Pessimistic, record-scoped leases arbitrate concurrent admin actions on
//! the same record. A lease is keyed by (record identifier, resource) and
//! carries a mode, an owning session, and an expiry instant. Acquisition
//! failure is immediate and visible; nothing retries.
//!
//! Two managers ship: [`InMemoryLockManager`] (single process, the
//! default) and, behind the `postgres` feature, a `PostgreSQL`-backed
//! [`postgres::PostgresLockManager`] for multi-process deployments.

mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryLockManager;

use crate::session::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lock mode for a lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Only one session may hold the record
    Exclusive,
    /// Multiple sessions may hold the record; excludes exclusive holders
    Shared,
}

impl LockMode {
    /// Stable string form, used by the `PostgreSQL` backend
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A granted lock lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Unique lease identifier
    pub id: Uuid,
    /// The locked record's identifier
    pub record_id: String,
    /// The resource (table) the record belongs to
    pub resource: String,
    /// Granted mode
    pub mode: LockMode,
    /// Session holding the lease
    pub owner: SessionId,
    /// When the lease lapses if not released or refreshed
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Whether the lease has lapsed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Lock manager errors
#[derive(Debug, Error)]
pub enum LockError {
    /// Another session holds a conflicting lease
    #[error("record {record_id} in {resource} is locked by another session")]
    Contended {
        /// The contended record's identifier
        record_id: String,
        /// The resource the record belongs to
        resource: String,
    },

    /// The lock backend itself failed
    #[error("lock backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Abstraction over lock lease storage
///
/// Implementations must treat re-acquisition by the holding session as a
/// refresh, not a conflict: confirmation flows acquire on first visit and
/// again on the confirming request.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire a lease on (`record_id`, `resource`) for `owner`
    ///
    /// # Errors
    ///
    /// [`LockError::Contended`] when another session holds a conflicting
    /// lease; [`LockError::Backend`] when the backing store fails.
    async fn acquire(
        &self,
        record_id: &str,
        resource: &str,
        mode: LockMode,
        owner: &SessionId,
    ) -> Result<Lease, LockError>;

    /// Release a specific lease
    ///
    /// Releasing an already-lapsed or unknown lease is not an error.
    async fn release(&self, lease: &Lease) -> Result<(), LockError>;

    /// Release every lease held by a session, returning how many were dropped
    async fn release_owned(&self, owner: &SessionId) -> Result<usize, LockError>;

    /// Drop every lapsed lease, returning how many were removed
    async fn sweep_expired(&self) -> Result<usize, LockError>;
}
