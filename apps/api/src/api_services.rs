mod database;
mod redis;
mod state_builder;

pub use database::connect_and_migrate;
pub use redis::build_redis_client;
pub use state_builder::{BuiltAppState, build_app_state};
