use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use strata_application::{LockLease, PartitionLockCoordinator};
use strata_core::AppResult;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::lease_validation::{LEASE_POLL_INTERVAL, lease_token, validate_lease_request};

/// Process-local lease coordinator for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryPartitionLockCoordinator {
    leases: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryPartitionLockCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_acquire(&self, scope_key: &str, token: &str, lease_seconds: u32) -> bool {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if leases
            .get(scope_key)
            .is_some_and(|(_, expires_at)| *expires_at > now)
        {
            return false;
        }

        leases.insert(
            scope_key.to_owned(),
            (
                token.to_owned(),
                now + Duration::from_secs(u64::from(lease_seconds)),
            ),
        );
        true
    }
}

#[async_trait]
impl PartitionLockCoordinator for InMemoryPartitionLockCoordinator {
    async fn acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
        wait: Duration,
    ) -> AppResult<Option<LockLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let token = lease_token(holder_id);
        let deadline = Instant::now() + wait;

        loop {
            if self.try_acquire(scope_key, token.as_str(), lease_seconds).await {
                return Ok(Some(LockLease {
                    scope_key: scope_key.to_owned(),
                    token,
                    holder_id: holder_id.to_owned(),
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(LEASE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> AppResult<()> {
        let mut leases = self.leases.lock().await;
        if leases
            .get(lease.scope_key.as_str())
            .is_some_and(|(token, _)| *token == lease.token)
        {
            leases.remove(lease.scope_key.as_str());
        }

        Ok(())
    }
}
