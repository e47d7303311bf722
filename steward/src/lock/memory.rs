//! In-memory lock manager
//!
//! Single-process lease table guarded by a `parking_lot` mutex. Lapsed
//! leases for a key are discarded on the next acquisition attempt.

use super::{Lease, LockError, LockManager, LockMode};
use crate::session::SessionId;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// Default lease lifetime
const DEFAULT_TTL_SECS: i64 = 600;

/// Process-local [`LockManager`]
#[derive(Debug)]
pub struct InMemoryLockManager {
    leases: Mutex<HashMap<(String, String), Vec<Lease>>>,
    ttl: Duration,
}

impl InMemoryLockManager {
    /// Create a manager with the default lease lifetime (10 minutes)
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl_secs(DEFAULT_TTL_SECS)
    }

    /// Create a manager with a custom lease lifetime
    #[must_use]
    pub fn with_ttl_secs(ttl_secs: i64) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    fn key(record_id: &str, resource: &str) -> (String, String) {
        (record_id.to_string(), resource.to_string())
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(
        &self,
        record_id: &str,
        resource: &str,
        mode: LockMode,
        owner: &SessionId,
    ) -> Result<Lease, LockError> {
        let mut table = self.leases.lock();
        let held = table.entry(Self::key(record_id, resource)).or_default();
        held.retain(|lease| !lease.is_expired());

        let conflict = held.iter().any(|lease| {
            lease.owner != *owner
                && (lease.mode == LockMode::Exclusive || mode == LockMode::Exclusive)
        });
        if conflict {
            return Err(LockError::Contended {
                record_id: record_id.to_string(),
                resource: resource.to_string(),
            });
        }

        // Re-acquisition by the same owner refreshes rather than stacks
        held.retain(|lease| lease.owner != *owner);
        let lease = Lease {
            id: Uuid::new_v4(),
            record_id: record_id.to_string(),
            resource: resource.to_string(),
            mode,
            owner: owner.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        held.push(lease.clone());
        Ok(lease)
    }

    async fn release(&self, lease: &Lease) -> Result<(), LockError> {
        let mut table = self.leases.lock();
        if let Some(held) = table.get_mut(&Self::key(&lease.record_id, &lease.resource)) {
            held.retain(|candidate| candidate.id != lease.id);
            if held.is_empty() {
                table.remove(&Self::key(&lease.record_id, &lease.resource));
            }
        }
        Ok(())
    }

    async fn release_owned(&self, owner: &SessionId) -> Result<usize, LockError> {
        let mut table = self.leases.lock();
        let mut dropped = 0;
        table.retain(|_, held| {
            let before = held.len();
            held.retain(|lease| lease.owner != *owner);
            dropped += before - held.len();
            !held.is_empty()
        });
        Ok(dropped)
    }

    async fn sweep_expired(&self) -> Result<usize, LockError> {
        let mut table = self.leases.lock();
        let mut dropped = 0;
        table.retain(|_, held| {
            let before = held.len();
            held.retain(|lease| !lease.is_expired());
            dropped += before - held.len();
            !held.is_empty()
        });
        Ok(dropped)
    }
}
