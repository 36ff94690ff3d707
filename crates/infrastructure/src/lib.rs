//! Infrastructure adapters for lifecycle ports.

#![forbid(unsafe_code)]

mod in_memory_partition_catalog;
mod in_memory_partition_lock_coordinator;
mod lease_validation;
mod postgres_lifecycle_log_repository;
mod postgres_lifecycle_settings_repository;
mod postgres_partition_catalog;
mod postgres_partition_tracking_repository;
mod postgres_policy_repository;
mod redis_partition_lock_coordinator;

#[cfg(test)]
mod test_database;

pub use in_memory_partition_catalog::InMemoryPartitionCatalog;
pub use in_memory_partition_lock_coordinator::InMemoryPartitionLockCoordinator;
pub use postgres_lifecycle_log_repository::PostgresLifecycleLogRepository;
pub use postgres_lifecycle_settings_repository::PostgresLifecycleSettingsRepository;
pub use postgres_partition_catalog::PostgresPartitionCatalog;
pub use postgres_partition_tracking_repository::PostgresPartitionTrackingRepository;
pub use postgres_policy_repository::PostgresPolicyRepository;
pub use redis_partition_lock_coordinator::RedisPartitionLockCoordinator;
