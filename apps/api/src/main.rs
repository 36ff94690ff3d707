//! Strata lifecycle management API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod state;

use strata_core::AppError;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = api_services::connect_and_migrate(&config.database_url).await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let built = api_services::build_app_state(pool, &config)?;
    if config.dev_seed {
        match built.in_memory_catalog.as_deref() {
            Some(catalog) => dev_seed::run(catalog, &built.app_state.policy_service).await?,
            None => warn!("ILM_DEV_SEED is ignored unless ILM_CATALOG_BACKEND=memory"),
        }
    }

    let app = api_router::build_router(built.app_state);
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(%address, catalog = ?config.catalog_backend, "strata-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("API server failed: {error}")))
}
