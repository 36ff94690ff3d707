use serde_json::json;
use strata_application::PolicyRepository;
use strata_core::AppError;
use strata_domain::{
    ComparisonOperator, ConditionExpr, PartitionMetric, Policy, PolicyId, PolicyTemplate,
    Temperature, ThresholdProfile,
};

use super::PostgresPolicyRepository;
use crate::test_database::{compression_input, test_pool, unique_name};

fn policy(name: &str, object: &str, priority: i64) -> Policy {
    Policy::new(PolicyId::new(), compression_input(name, object, priority))
        .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn policies_round_trip_with_their_conditions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);

    let mut input = compression_input(&unique_name("compress"), "sales_fact", 150);
    input.access_pattern = Some(Temperature::Warm);
    input.size_threshold_mb = Some(512);
    input.custom_condition = Some(ConditionExpr::All {
        conditions: vec![ConditionExpr::Compare {
            metric: PartitionMetric::RowCount,
            operator: ComparisonOperator::Gt,
            value: 10_000,
        }],
    });
    let stored = Policy::new(PolicyId::new(), input).unwrap_or_else(|_| unreachable!());

    assert!(repository.create_policy(stored.clone()).await.is_ok());

    let found = repository.find_policy(stored.id()).await;
    assert!(found.is_ok());
    assert_eq!(found.unwrap_or_default(), Some(stored.clone()));

    let by_name = repository
        .find_policy_by_name(stored.name().as_str())
        .await
        .unwrap_or_default();
    assert_eq!(by_name.map(|policy| policy.id()), Some(stored.id()));
}

#[tokio::test]
async fn duplicate_policy_names_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);
    let name = unique_name("dup");

    assert!(repository.create_policy(policy(&name, "sales_fact", 100)).await.is_ok());
    let duplicate = repository.create_policy(policy(&name, "orders_fact", 200)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn batch_creation_is_atomic() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);
    let taken = unique_name("taken");
    let fresh = unique_name("fresh");
    assert!(repository.create_policy(policy(&taken, "sales_fact", 100)).await.is_ok());

    let batch = repository
        .create_policies(vec![
            policy(&fresh, "sales_fact", 100),
            policy(&taken, "sales_fact", 200),
        ])
        .await;
    assert!(matches!(batch, Err(AppError::Conflict(_))));
    assert!(
        repository
            .find_policy_by_name(&fresh)
            .await
            .unwrap_or_default()
            .is_none()
    );
}

#[tokio::test]
async fn update_and_delete_require_an_existing_policy() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);
    let stored = policy(&unique_name("update"), "sales_fact", 100);
    assert!(repository.create_policy(stored.clone()).await.is_ok());

    let disabled = stored.clone().with_enabled(false);
    assert!(repository.update_policy(disabled).await.is_ok());
    let found = repository
        .find_policy(stored.id())
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert!(!found.is_enabled());

    assert!(repository.delete_policy(stored.id()).await.is_ok());
    assert!(matches!(
        repository.delete_policy(stored.id()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        repository.update_policy(stored).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn referenced_profiles_cannot_be_deleted() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);
    let profile_name = unique_name("profile");
    let profile = ThresholdProfile::new(profile_name.clone(), 30, 90, 365, None)
        .unwrap_or_else(|_| unreachable!());
    assert!(repository.save_profile(profile.clone()).await.is_ok());

    let mut input = compression_input(&unique_name("profiled"), "sales_fact", 100);
    input.threshold_profile = Some(profile_name.clone());
    let profiled = Policy::new(PolicyId::new(), input).unwrap_or_else(|_| unreachable!());
    assert!(repository.create_policy(profiled.clone()).await.is_ok());

    let blocked = repository.delete_profile(&profile_name).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    assert!(repository.delete_policy(profiled.id()).await.is_ok());
    assert!(repository.delete_profile(&profile_name).await.is_ok());
    assert!(
        repository
            .find_profile(&profile_name)
            .await
            .unwrap_or_default()
            .is_none()
    );
}

#[tokio::test]
async fn templates_are_upserted_by_name() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPolicyRepository::new(pool);
    let name = unique_name("template");
    let document = json!([
        {"policy_name": "compress_90d", "policy_type": "COMPRESSION", "action_type": "COMPRESS", "age_days": 90, "compression_type": "QUERY HIGH"}
    ]);

    let first = PolicyTemplate::new(name.clone(), None, document.clone())
        .unwrap_or_else(|_| unreachable!());
    assert!(repository.save_template(first).await.is_ok());

    let second = PolicyTemplate::new(name.clone(), Some("quarterly".to_owned()), document)
        .unwrap_or_else(|_| unreachable!());
    assert!(repository.save_template(second.clone()).await.is_ok());

    let found = repository.find_template(&name).await.unwrap_or_default();
    assert_eq!(found, Some(second));

    assert!(repository.delete_template(&name).await.is_ok());
    assert!(matches!(
        repository.delete_template(&name).await,
        Err(AppError::NotFound(_))
    ));
}
