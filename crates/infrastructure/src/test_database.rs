use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use strata_domain::{ActionType, PolicyInput, PolicyType};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects to `DATABASE_URL` and migrates it; `None` skips database tests.
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres lifecycle tests: {error}");
    }

    Some(pool)
}

/// Returns a name that does not collide across test runs.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub fn compression_input(name: &str, object: &str, priority: i64) -> PolicyInput {
    PolicyInput {
        name: name.to_owned(),
        owner: "dwh".to_owned(),
        object: object.to_owned(),
        policy_type: PolicyType::Compression,
        action_type: ActionType::Compress,
        age_days: Some(90),
        age_months: None,
        access_pattern: None,
        size_threshold_mb: None,
        custom_condition: None,
        compression_type: Some("QUERY HIGH".to_owned()),
        target_location: None,
        priority,
        enabled: true,
        threshold_profile: None,
    }
}
