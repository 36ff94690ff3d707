use chrono::{Months, Utc};
use strata_application::PolicyService;
use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, CompressionCodec, Granularity, ObjectRef, PartitionSnapshot, PolicyInput,
    PolicyType, Temperature, TierConfig, TierDefinition, build_boundaries,
};
use strata_infrastructure::InMemoryPartitionCatalog;
use tracing::info;

const DEV_SEED_OWNER: &str = "DWH";
const DEV_SEED_OBJECT: &str = "SALES_FACT";
const DEV_SEED_HISTORY_MONTHS: u32 = 48;
const DEV_SEED_ROWS_PER_PARTITION: i64 = 250_000;
const DEV_SEED_BYTES_PER_PARTITION: i64 = 256 * 1024 * 1024;

/// Registers a tiered demo object in the in-memory catalog and a starter policy set.
pub async fn run(catalog: &InMemoryPartitionCatalog, policy_service: &PolicyService) -> AppResult<()> {
    let object = ObjectRef::new(DEV_SEED_OWNER, DEV_SEED_OBJECT)?;
    let today = Utc::now().date_naive();
    let min_date = today
        .checked_sub_months(Months::new(DEV_SEED_HISTORY_MONTHS))
        .ok_or_else(|| AppError::Internal("dev seed history start is out of range".to_owned()))?;

    let tier_config = demo_tier_config()?;
    for tier in [Temperature::Hot, Temperature::Warm, Temperature::Cold] {
        if let Some(location) = tier_config
            .tier(tier)
            .and_then(|definition| definition.location.as_deref())
        {
            catalog.register_location(location).await;
        }
    }

    let partitions = build_boundaries(min_date, today, today, Some(&tier_config))?
        .into_iter()
        .map(|boundary| PartitionSnapshot {
            name: boundary.name,
            lower_bound: boundary.lower_bound,
            upper_bound: Some(boundary.upper_bound),
            location: boundary.location.unwrap_or_else(|| "DATA_HOT".to_owned()),
            codec: boundary.codec.unwrap_or(CompressionCodec::None),
            row_count: DEV_SEED_ROWS_PER_PARTITION,
            size_bytes: DEV_SEED_BYTES_PER_PARTITION,
            heat: None,
        })
        .collect::<Vec<_>>();
    let partition_count = partitions.len();
    catalog
        .register_object(object.clone(), true, partitions)
        .await?;

    if policy_service.list_policies().await?.is_empty() {
        for input in demo_policies() {
            policy_service.create_policy(input).await?;
        }
    }

    info!(object = %object, partitions = partition_count, "dev seed applied");
    Ok(())
}

fn demo_tier_config() -> AppResult<TierConfig> {
    TierConfig::new(
        true,
        vec![
            tier(Temperature::Hot, 0, Granularity::Month, "DATA_HOT", None),
            tier(
                Temperature::Warm,
                12,
                Granularity::Quarter,
                "DATA_WARM",
                Some(CompressionCodec::Basic),
            ),
            tier(
                Temperature::Cold,
                36,
                Granularity::Year,
                "DATA_COLD",
                Some(CompressionCodec::ArchiveHigh),
            ),
        ],
    )
}

fn tier(
    tier: Temperature,
    min_age_months: u32,
    granularity: Granularity,
    location: &str,
    codec: Option<CompressionCodec>,
) -> TierDefinition {
    TierDefinition {
        tier,
        min_age_months,
        granularity,
        location: Some(location.to_owned()),
        codec,
    }
}

fn demo_policies() -> Vec<PolicyInput> {
    vec![
        PolicyInput {
            name: "sales_fact_compress_90d".to_owned(),
            owner: DEV_SEED_OWNER.to_owned(),
            object: DEV_SEED_OBJECT.to_owned(),
            policy_type: PolicyType::Compression,
            action_type: ActionType::Compress,
            age_days: Some(90),
            age_months: None,
            access_pattern: None,
            size_threshold_mb: None,
            custom_condition: None,
            compression_type: Some("QUERY HIGH".to_owned()),
            target_location: None,
            priority: 100,
            enabled: true,
            threshold_profile: None,
        },
        PolicyInput {
            name: "sales_fact_tier_cold_24m".to_owned(),
            owner: DEV_SEED_OWNER.to_owned(),
            object: DEV_SEED_OBJECT.to_owned(),
            policy_type: PolicyType::Tiering,
            action_type: ActionType::Move,
            age_days: None,
            age_months: Some(24),
            access_pattern: None,
            size_threshold_mb: None,
            custom_condition: None,
            compression_type: Some("ARCHIVE HIGH".to_owned()),
            target_location: Some("DATA_COLD".to_owned()),
            priority: 200,
            enabled: true,
            threshold_profile: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use strata_domain::build_boundaries;

    use super::demo_tier_config;

    #[test]
    fn demo_layout_places_every_partition_in_a_known_location() {
        let tier_config = demo_tier_config().unwrap_or_else(|_| unreachable!());
        let today = Utc::now().date_naive();
        let min_date = today
            .checked_sub_months(chrono::Months::new(48))
            .unwrap_or(today);

        let boundaries = build_boundaries(min_date, today, today, Some(&tier_config))
            .unwrap_or_default();

        assert!(!boundaries.is_empty());
        assert!(boundaries.iter().all(|boundary| {
            matches!(
                boundary.location.as_deref(),
                Some("DATA_HOT" | "DATA_WARM" | "DATA_COLD")
            )
        }));
    }
}
