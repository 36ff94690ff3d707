use std::sync::Arc;

use strata_application::PartitionLockCoordinator;
use strata_infrastructure::{InMemoryPartitionLockCoordinator, RedisPartitionLockCoordinator};
use tracing::warn;

use crate::api_config::ApiConfig;

pub(super) fn build_lock_coordinator(
    config: &ApiConfig,
    redis_client: Option<redis::Client>,
) -> Arc<dyn PartitionLockCoordinator> {
    match redis_client {
        Some(client) => Arc::new(RedisPartitionLockCoordinator::new(
            client,
            config.lock_key_prefix.clone(),
        )),
        None => {
            warn!("REDIS_URL is not set, partition locks are local to this process");
            Arc::new(InMemoryPartitionLockCoordinator::new())
        }
    }
}
