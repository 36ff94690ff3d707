use std::time::Duration;

use async_trait::async_trait;
use strata_core::AppResult;
use strata_domain::{ObjectRef, PartitionKey};

/// One held lock lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Returns the lock scope guarding one partition's transitions.
#[must_use]
pub fn partition_lock_key(key: &PartitionKey) -> String {
    format!("partition:{key}")
}

/// Returns the lock scope guarding structural changes of one object.
#[must_use]
pub fn object_lock_key(object: &ObjectRef) -> String {
    format!("object:{object}")
}

/// Returns the lease scope serializing access refreshes of one object.
#[must_use]
pub fn refresh_lock_key(object: &ObjectRef) -> String {
    format!("refresh:{object}")
}

/// Exclusive lease coordination port for partitions and objects.
#[async_trait]
pub trait PartitionLockCoordinator: Send + Sync {
    /// Acquires one lease, waiting at most `wait`; returns `None` on timeout.
    async fn acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
        wait: Duration,
    ) -> AppResult<Option<LockLease>>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release(&self, lease: &LockLease) -> AppResult<()>;
}
