//! `PostgreSQL`-backed lock manager
//!
//! Multi-process lease table for deployments where several admin frontends
//! share one database. Leases live in the `steward_locks` table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS steward_locks (
//!     lease_id   UUID PRIMARY KEY,
//!     record_id  TEXT NOT NULL,
//!     resource   TEXT NOT NULL,
//!     mode       TEXT NOT NULL,
//!     owner      TEXT NOT NULL,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (record_id, resource, owner)
//! );
//! ```
//!
//! Call [`PostgresLockManager::ensure_schema`] once at startup (or manage
//! the table with your migration tooling).

use super::{Lease, LockError, LockManager, LockMode};
use crate::session::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Default lease lifetime
const DEFAULT_TTL_SECS: i64 = 600;

/// [`LockManager`] persisting leases to `PostgreSQL`
#[derive(Debug, Clone)]
pub struct PostgresLockManager {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresLockManager {
    /// Create a manager over an existing pool with the default lease
    /// lifetime (10 minutes)
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_ttl_secs(pool, DEFAULT_TTL_SECS)
    }

    /// Create a manager with a custom lease lifetime
    #[must_use]
    pub fn with_ttl_secs(pool: PgPool, ttl_secs: i64) -> Self {
        Self {
            pool,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Create the lease table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), LockError> {
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS steward_locks (
                lease_id   UUID PRIMARY KEY,
                record_id  TEXT NOT NULL,
                resource   TEXT NOT NULL,
                mode       TEXT NOT NULL,
                owner      TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                UNIQUE (record_id, resource, owner)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LockManager for PostgresLockManager {
    async fn acquire(
        &self,
        record_id: &str,
        resource: &str,
        mode: LockMode,
        owner: &SessionId,
    ) -> Result<Lease, LockError> {
        let mut tx = self.pool.begin().await?;

        // Clear lapsed leases for this record before judging contention
        sqlx::query(
            "DELETE FROM steward_locks
             WHERE record_id = $1 AND resource = $2 AND expires_at <= NOW()",
        )
        .bind(record_id)
        .bind(resource)
        .execute(&mut *tx)
        .await?;

        let conflicting: Option<String> = sqlx::query_scalar(
            "SELECT owner FROM steward_locks
             WHERE record_id = $1 AND resource = $2 AND owner <> $3
               AND (mode = 'exclusive' OR $4 = 'exclusive')
             LIMIT 1",
        )
        .bind(record_id)
        .bind(resource)
        .bind(owner.as_str())
        .bind(mode.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if conflicting.is_some() {
            tx.rollback().await?;
            return Err(LockError::Contended {
                record_id: record_id.to_string(),
                resource: resource.to_string(),
            });
        }

        let lease = Lease {
            id: Uuid::new_v4(),
            record_id: record_id.to_string(),
            resource: resource.to_string(),
            mode,
            owner: owner.clone(),
            expires_at: Utc::now() + self.ttl,
        };

        // Re-acquisition by the same owner refreshes the row in place
        sqlx::query(
            "INSERT INTO steward_locks (lease_id, record_id, resource, mode, owner, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (record_id, resource, owner)
             DO UPDATE SET lease_id = $1, mode = $4, expires_at = $6",
        )
        .bind(lease.id)
        .bind(&lease.record_id)
        .bind(&lease.resource)
        .bind(lease.mode.as_str())
        .bind(lease.owner.as_str())
        .bind::<DateTime<Utc>>(lease.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(lease)
    }

    async fn release(&self, lease: &Lease) -> Result<(), LockError> {
        sqlx::query("DELETE FROM steward_locks WHERE lease_id = $1")
            .bind(lease.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release_owned(&self, owner: &SessionId) -> Result<usize, LockError> {
        let result = sqlx::query("DELETE FROM steward_locks WHERE owner = $1")
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    async fn sweep_expired(&self) -> Result<usize, LockError> {
        let result = sqlx::query("DELETE FROM steward_locks WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}
