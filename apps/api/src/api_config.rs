use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use strata_core::AppError;
use tracing_subscriber::EnvFilter;

/// Partition catalog adapter selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogBackend {
    Postgres,
    InMemory,
}

impl CatalogBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" | "in_memory" => Ok(Self::InMemory),
            other => Err(AppError::Validation(format!(
                "ILM_CATALOG_BACKEND must be either 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub lock_key_prefix: String,
    pub api_host: String,
    pub api_port: u16,
    pub catalog_backend: CatalogBackend,
    pub dev_seed: bool,
    pub default_max_actions: usize,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let lock_key_prefix =
            env::var("ILM_LOCK_KEY_PREFIX").unwrap_or_else(|_| "strata:ilm:lock".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let catalog_backend = CatalogBackend::parse(
            env::var("ILM_CATALOG_BACKEND")
                .unwrap_or_else(|_| "postgres".to_owned())
                .as_str(),
        )?;
        let dev_seed = env::var("ILM_DEV_SEED")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let default_max_actions = env::var("ILM_MAX_ACTIONS")
            .ok()
            .map(|value| {
                value.parse::<usize>().map_err(|error| {
                    AppError::Validation(format!("invalid ILM_MAX_ACTIONS: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(100);
        if default_max_actions == 0 {
            return Err(AppError::Validation(
                "ILM_MAX_ACTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            database_url,
            redis_url,
            lock_key_prefix,
            api_host,
            api_port,
            catalog_backend,
            dev_seed,
            default_max_actions,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
