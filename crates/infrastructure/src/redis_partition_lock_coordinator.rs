//! Redis-backed distributed lease coordinator for partition and object locks.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::MultiplexedConnection;
use strata_application::{LockLease, PartitionLockCoordinator};
use strata_core::{AppError, AppResult};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::lease_validation::{LEASE_POLL_INTERVAL, lease_token, validate_lease_request};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of partition lock coordination.
#[derive(Clone)]
pub struct RedisPartitionLockCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPartitionLockCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl PartitionLockCoordinator for RedisPartitionLockCoordinator {
    async fn acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
        wait: Duration,
    ) -> AppResult<Option<LockLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let key = self.key_for(scope_key);
        let token = lease_token(holder_id);
        let deadline = Instant::now() + wait;
        let mut connection = self.connection().await?;

        loop {
            let reply: Option<String> = redis::cmd("SET")
                .arg(key.as_str())
                .arg(token.as_str())
                .arg("NX")
                .arg("EX")
                .arg(i64::from(lease_seconds))
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to acquire partition lock: {error}"))
                })?;

            if reply.is_some() {
                return Ok(Some(LockLease {
                    scope_key: scope_key.to_owned(),
                    token,
                    holder_id: holder_id.to_owned(),
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(scope_key, holder_id, "partition lock wait timed out");
                return Ok(None);
            }
            sleep(LEASE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LEASE_SCRIPT);
        let mut connection = self.connection().await?;

        script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release partition lock: {error}"))
            })?;

        Ok(())
    }
}
