use std::sync::Arc;

use sqlx::PgPool;
use strata_application::PartitionCatalog;
use strata_infrastructure::{
    InMemoryPartitionCatalog, PostgresLifecycleLogRepository, PostgresLifecycleSettingsRepository,
    PostgresPartitionCatalog, PostgresPartitionTrackingRepository, PostgresPolicyRepository,
};

use crate::api_config::{ApiConfig, CatalogBackend};

pub(super) struct RepositorySet {
    pub(super) catalog: Arc<dyn PartitionCatalog>,
    pub(super) in_memory_catalog: Option<Arc<InMemoryPartitionCatalog>>,
    pub(super) policy_repository: Arc<PostgresPolicyRepository>,
    pub(super) tracking_repository: Arc<PostgresPartitionTrackingRepository>,
    pub(super) log_repository: Arc<PostgresLifecycleLogRepository>,
    pub(super) settings_repository: Arc<PostgresLifecycleSettingsRepository>,
}

pub(super) fn build_repository_set(pool: &PgPool, config: &ApiConfig) -> RepositorySet {
    let (catalog, in_memory_catalog): (Arc<dyn PartitionCatalog>, _) = match config.catalog_backend
    {
        CatalogBackend::Postgres => (Arc::new(PostgresPartitionCatalog::new(pool.clone())), None),
        CatalogBackend::InMemory => {
            let catalog = Arc::new(InMemoryPartitionCatalog::new());
            (catalog.clone(), Some(catalog))
        }
    };

    RepositorySet {
        catalog,
        in_memory_catalog,
        policy_repository: Arc::new(PostgresPolicyRepository::new(pool.clone())),
        tracking_repository: Arc::new(PostgresPartitionTrackingRepository::new(pool.clone())),
        log_repository: Arc::new(PostgresLifecycleLogRepository::new(pool.clone())),
        settings_repository: Arc::new(PostgresLifecycleSettingsRepository::new(pool.clone())),
    }
}
