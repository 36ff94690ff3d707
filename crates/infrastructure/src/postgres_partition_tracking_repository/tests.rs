use chrono::{Duration, Utc};
use sqlx::PgPool;
use strata_application::{
    AccessRecordRepository, EvaluationQueueRepository, ExecutionScope, PolicyRepository,
    QueueEntryUpsert, QueueMergeOutcome, QueueStatus,
};
use strata_domain::{
    CompressionCodec, EstimateSource, ObjectRef, PartitionAccessRecord, PartitionKey, Policy,
    PolicyId, Temperature,
};

use super::PostgresPartitionTrackingRepository;
use crate::PostgresPolicyRepository;
use crate::test_database::{compression_input, test_pool, unique_name};

async fn stored_policy(pool: &PgPool, object: &str, priority: i64) -> Policy {
    let policy = Policy::new(
        PolicyId::new(),
        compression_input(&unique_name("queue"), object, priority),
    )
    .unwrap_or_else(|_| unreachable!());
    let created = PostgresPolicyRepository::new(pool.clone())
        .create_policy(policy.clone())
        .await;
    assert!(created.is_ok());
    policy
}

fn upsert(policy: &Policy, key: &PartitionKey) -> QueueEntryUpsert {
    QueueEntryUpsert {
        policy_id: policy.id(),
        policy_name: policy.name().as_str().to_owned(),
        key: key.clone(),
        target: policy.transition_target(),
        priority: policy.priority(),
    }
}

#[tokio::test]
async fn access_records_upsert_by_natural_key() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool);
    let object = ObjectRef::new("dwh", unique_name("fact")).unwrap_or_else(|_| unreachable!());
    let key = object.partition("P_2024_01").unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    let mut record = PartitionAccessRecord {
        key: key.clone(),
        last_write_at: now - Duration::days(40),
        last_read_at: None,
        read_count: 0,
        write_count: 0,
        heat_observations: 0,
        row_count: 1_000,
        size_bytes: 64 * 1024 * 1024,
        codec: CompressionCodec::None,
        location: "USERS".to_owned(),
        age_days: 40,
        temperature: Temperature::Hot,
        estimate_source: EstimateSource::BoundaryEstimate,
        refreshed_at: now,
    };
    assert!(repository.upsert_record(record.clone()).await.is_ok());

    record.codec = CompressionCodec::QueryHigh;
    record.size_bytes = 16 * 1024 * 1024;
    assert!(repository.upsert_record(record.clone()).await.is_ok());

    let records = repository.list_records(&object).await.unwrap_or_default();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].codec, CompressionCodec::QueryHigh);
    assert_eq!(records[0].size_bytes, 16 * 1024 * 1024);

    assert!(repository.delete_record(&key).await.is_ok());
    assert!(repository.find_record(&key).await.unwrap_or_default().is_none());
}

#[tokio::test]
async fn merge_never_replaces_executing_entries() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool.clone());
    let object = unique_name("fact");
    let policy = stored_policy(&pool, &object, 100).await;
    let key = PartitionKey::new("dwh", object.as_str(), "P_2024_01").unwrap_or_else(|_| unreachable!());

    let first = repository.merge_entry(upsert(&policy, &key)).await;
    assert_eq!(first.ok(), Some(QueueMergeOutcome::Inserted));
    let second = repository.merge_entry(upsert(&policy, &key)).await;
    assert_eq!(second.ok(), Some(QueueMergeOutcome::Updated));

    assert!(repository.claim_entry(policy.id(), &key).await.unwrap_or_default());
    assert!(!repository.claim_entry(policy.id(), &key).await.unwrap_or(true));

    let while_executing = repository.merge_entry(upsert(&policy, &key)).await;
    assert_eq!(while_executing.ok(), Some(QueueMergeOutcome::SkippedExecuting));
    assert!(
        !repository
            .mark_ineligible(policy.id(), &key, "already compressed")
            .await
            .unwrap_or(true)
    );

    let entry = repository
        .find_entry(policy.id(), &key)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(entry.status, QueueStatus::Executing);
}

#[tokio::test]
async fn failures_keep_attempts_across_requeue() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool.clone());
    let object = unique_name("fact");
    let policy = stored_policy(&pool, &object, 100).await;
    let key = PartitionKey::new("dwh", object.as_str(), "P_2024_02").unwrap_or_else(|_| unreachable!());

    assert!(repository.merge_entry(upsert(&policy, &key)).await.is_ok());
    assert!(repository.claim_entry(policy.id(), &key).await.unwrap_or_default());
    assert!(repository.fail_entry(policy.id(), &key, "disk full").await.is_ok());
    assert!(repository.merge_entry(upsert(&policy, &key)).await.is_ok());

    let entry = repository
        .find_entry(policy.id(), &key)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.last_error.as_deref(), Some("disk full"));
    assert_eq!(entry.target.codec(), Some(CompressionCodec::QueryHigh));

    assert!(repository.claim_entry(policy.id(), &key).await.unwrap_or_default());
    assert!(repository.complete_entry(policy.id(), &key).await.is_ok());
    assert!(
        repository
            .find_entry(policy.id(), &key)
            .await
            .unwrap_or_default()
            .is_none()
    );
}

#[tokio::test]
async fn ineligible_markers_are_not_runnable() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool.clone());
    let object = unique_name("fact");
    let policy = stored_policy(&pool, &object, 100).await;
    let key = PartitionKey::new("dwh", object.as_str(), "P_2024_03").unwrap_or_else(|_| unreachable!());

    assert!(repository.merge_entry(upsert(&policy, &key)).await.is_ok());
    assert!(
        repository
            .mark_ineligible(policy.id(), &key, "already compressed")
            .await
            .unwrap_or_default()
    );
    assert!(
        !repository
            .mark_ineligible(policy.id(), &key, "already compressed")
            .await
            .unwrap_or(true)
    );

    let runnable = repository
        .list_runnable(&ExecutionScope::Policy(policy.id()))
        .await
        .unwrap_or_default();
    assert!(runnable.is_empty());
    assert!(!repository.claim_entry(policy.id(), &key).await.unwrap_or(true));
}

#[tokio::test]
async fn runnable_entries_follow_priority_then_queue_time() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool.clone());
    let object_name = unique_name("fact");
    let late = stored_policy(&pool, &object_name, 300).await;
    let early = stored_policy(&pool, &object_name, 100).await;
    let key = PartitionKey::new("dwh", object_name.as_str(), "P_2024_04").unwrap_or_else(|_| unreachable!());

    assert!(repository.merge_entry(upsert(&late, &key)).await.is_ok());
    assert!(repository.merge_entry(upsert(&early, &key)).await.is_ok());

    let object = key.object().clone();
    let runnable = repository
        .list_runnable(&ExecutionScope::Object(object))
        .await
        .unwrap_or_default();
    let order: Vec<PolicyId> = runnable.iter().map(|entry| entry.policy_id).collect();
    assert_eq!(order, vec![early.id(), late.id()]);

    assert_eq!(repository.delete_partition_entries(&key).await.unwrap_or_default(), 2);
}

#[tokio::test]
async fn expired_claims_return_to_failed() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPartitionTrackingRepository::new(pool.clone());
    let object = unique_name("fact");
    let policy = stored_policy(&pool, &object, 100).await;
    let abandoned =
        PartitionKey::new("dwh", object.as_str(), "P_2024_05").unwrap_or_else(|_| unreachable!());
    let active =
        PartitionKey::new("dwh", object.as_str(), "P_2024_06").unwrap_or_else(|_| unreachable!());

    for key in [&abandoned, &active] {
        assert!(repository.merge_entry(upsert(&policy, key)).await.is_ok());
        assert!(repository.claim_entry(policy.id(), key).await.unwrap_or_default());
    }
    let backdated = sqlx::query(
        r#"
        UPDATE ilm_evaluation_queue
        SET updated_at = now() - INTERVAL '1 hour'
        WHERE policy_id = $1 AND partition_name = $2
        "#,
    )
    .bind(policy.id().as_uuid())
    .bind(abandoned.partition())
    .execute(&pool)
    .await;
    assert!(backdated.is_ok());

    let released = repository
        .release_stale_claims(Utc::now() - Duration::minutes(10))
        .await
        .unwrap_or_default();
    assert_eq!(released, 1);

    let entry = repository
        .find_entry(policy.id(), &abandoned)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(entry.status, QueueStatus::Failed);
    assert_eq!(entry.attempts, 1);
    assert!(entry.is_runnable());
    assert!(repository.claim_entry(policy.id(), &abandoned).await.unwrap_or_default());

    let still_claimed = repository
        .find_entry(policy.id(), &active)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(still_claimed.status, QueueStatus::Executing);

    assert_eq!(
        repository
            .delete_partition_entries(&abandoned)
            .await
            .unwrap_or_default(),
        1
    );
    assert_eq!(
        repository
            .delete_partition_entries(&active)
            .await
            .unwrap_or_default(),
        1
    );
}
