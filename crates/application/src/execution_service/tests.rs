use chrono::{Duration, Utc};
use strata_core::AppError;
use strata_domain::{
    ActionType, CompressionCodec, LifecycleSettings, PartitionSnapshot, PolicyType,
};

use crate::lifecycle_ports::{
    AccessRecordRepository, EvaluationQueueRepository, ExecutionScope, ExecutionStatus,
    MergeStatus, QueueStatus, object_lock_key, partition_lock_key,
};
use crate::test_support::{
    Harness, compression_input, date, key, sales, snapshot, tiering_input,
};

fn aged(name: &str, age_days: i64) -> PartitionSnapshot {
    let upper = Utc::now().date_naive() - Duration::days(age_days - 1);
    snapshot(name, Some(upper - Duration::days(1)), Some(upper), "USERS", CompressionCodec::None)
}

async fn tracked_harness(partitions: Vec<PartitionSnapshot>) -> Harness {
    let harness = Harness::default();
    harness.catalog.add_object(sales(), true, partitions).await;
    harness.catalog.add_location("ARCHIVE").await;
    harness
}

async fn refresh_and_evaluate(harness: &Harness) {
    assert!(harness.tracking().refresh(&sales()).await.is_ok());
    assert!(harness.evaluation().evaluate_all().await.is_ok());
}

#[tokio::test]
async fn executed_partitions_are_not_requeued() {
    let harness = tracked_harness(vec![aged("P_A", 35)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;

    let report = harness.execution().execute(10, false, ExecutionScope::All).await;
    assert!(report.is_ok());
    let report = report.unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);

    let partitions = harness.catalog.partitions(&sales()).await;
    assert_eq!(partitions[0].codec, CompressionCodec::QueryHigh);
    let record = harness
        .access_records
        .find_record(&key("P_A"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(record.codec, CompressionCodec::QueryHigh);

    let summary = harness
        .evaluation()
        .evaluate(policy.id())
        .await
        .unwrap_or_default();
    assert_eq!(summary.queued, 0);
    assert_eq!(summary.already_satisfied, 1);

    let second = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(second.planned.is_empty());
    assert_eq!(harness.logs.executions.lock().await.len(), 1);
}

#[tokio::test]
async fn highest_priority_policy_wins_a_shared_partition() {
    let harness = tracked_harness(vec![aged("P_A", 35)]).await;
    let winner = harness
        .store_policy(compression_input("compress_fast", 30, 100))
        .await;
    let mut archive = compression_input("compress_archive", 30, 200);
    archive.compression_type = Some("ARCHIVE HIGH".to_owned());
    let loser = harness.store_policy(archive).await;
    refresh_and_evaluate(&harness).await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.planned.len(), 1);
    assert_eq!(report.duplicates_skipped, 1);

    let logs = harness.logs.executions.lock().await.clone();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].policy_id, winner.id());
    assert_eq!(logs[0].status, ExecutionStatus::Success);

    let remaining = harness
        .queue
        .find_entry(loser.id(), &key("P_A"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(remaining.status, QueueStatus::Pending);
}

#[tokio::test]
async fn simulate_plans_the_same_actions_without_side_effects() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40)]).await;
    harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    let execution = harness.execution();

    let simulated = execution
        .execute(10, true, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(simulated.simulated);
    assert_eq!(simulated.planned.len(), 2);
    assert!(harness.logs.executions.lock().await.is_empty());
    assert!(harness.locks.acquired().await.is_empty());
    assert!(
        harness
            .catalog
            .partitions(&sales())
            .await
            .iter()
            .all(|partition| partition.codec == CompressionCodec::None)
    );
    let planned = &simulated.planned[0];
    assert!(planned.estimated_size_after_bytes < planned.size_before_bytes);

    let real = execution
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    let simulated_targets: Vec<_> = simulated
        .planned
        .iter()
        .map(|action| (action.entry.key.clone(), action.entry.target.clone()))
        .collect();
    let real_targets: Vec<_> = real
        .planned
        .iter()
        .map(|action| (action.entry.key.clone(), action.entry.target.clone()))
        .collect();
    assert_eq!(simulated_targets, real_targets);
    assert_eq!(real.succeeded, 2);
}

#[tokio::test]
async fn failures_are_recorded_and_the_batch_continues() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    harness.catalog.fail_partition("P_A").await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let failed = harness
        .queue
        .find_entry(policy.id(), &key("P_A"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(failed.status, QueueStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed.is_runnable());

    let logs = harness.logs.executions.lock().await.clone();
    let failed_log = logs
        .iter()
        .find(|entry| entry.status == ExecutionStatus::Failed)
        .unwrap_or_else(|| unreachable!());
    assert_eq!(failed_log.error_kind.as_deref(), Some("internal"));
    assert_eq!(failed.last_error, failed_log.error_detail);
    assert!(logs.iter().all(|entry| entry.run_id == report.run_id));
}

#[tokio::test]
async fn held_partition_lock_leaves_the_entry_untouched() {
    let harness = tracked_harness(vec![aged("P_A", 35)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    harness.locks.hold(partition_lock_key(&key("P_A")).as_str()).await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.failed, 1);
    assert_eq!(report.lock_timeouts, 1);

    let logs = harness.logs.executions.lock().await.clone();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_kind.as_deref(), Some("lock_timeout"));

    let entry = harness
        .queue
        .find_entry(policy.id(), &key("P_A"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.attempts, 0);
}

#[tokio::test]
async fn emergency_stop_halts_before_new_actions() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40), aged("P_C", 45)]).await;
    harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;

    harness
        .settings
        .set(LifecycleSettings::default().with_emergency_stop(true))
        .await;
    let stopped = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(stopped.halted);
    assert!(stopped.planned.is_empty());

    harness.settings.set(LifecycleSettings::default()).await;
    harness.settings.stop_after_checks(1).await;
    let interrupted = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(interrupted.halted);
    assert_eq!(interrupted.succeeded, 1);
    assert_eq!(harness.logs.executions.lock().await.len(), 1);
}

#[tokio::test]
async fn max_actions_and_scope_bound_the_run() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40), aged("P_C", 45)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    let execution = harness.execution();

    assert!(matches!(
        execution.execute(0, false, ExecutionScope::All).await,
        Err(AppError::Validation(_))
    ));

    let capped = execution
        .execute(2, true, ExecutionScope::Policy(policy.id()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(capped.planned.len(), 2);

    let other = strata_domain::ObjectRef::new("dwh", "other").unwrap_or_else(|_| unreachable!());
    let out_of_scope = execution
        .execute(10, false, ExecutionScope::Object(other))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(out_of_scope.planned.is_empty());
}

#[tokio::test]
async fn dropped_partitions_lose_their_record_and_entries() {
    let harness = tracked_harness(vec![aged("P_A", 800)]).await;
    let mut purge = compression_input("purge_2y", 0, 900);
    purge.policy_type = PolicyType::Purge;
    purge.action_type = ActionType::Drop;
    purge.age_days = None;
    purge.age_months = Some(24);
    purge.compression_type = None;
    let policy = harness.store_policy(purge).await;
    refresh_and_evaluate(&harness).await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 1);
    assert!(harness.catalog.partitions(&sales()).await.is_empty());
    assert!(
        harness
            .access_records
            .find_record(&key("P_A"))
            .await
            .unwrap_or_default()
            .is_none()
    );
    assert!(
        harness
            .queue
            .list_entries(Some(policy.id()))
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn relocation_triggers_consolidation() {
    let harness = tracked_harness(vec![
        snapshot(
            "P_2023",
            Some(date(2023, 1, 1)),
            Some(date(2023, 3, 1)),
            "ARCHIVE",
            CompressionCodec::ArchiveHigh,
        ),
        snapshot(
            "P_2023_03",
            Some(date(2023, 3, 1)),
            Some(date(2023, 4, 1)),
            "USERS",
            CompressionCodec::None,
        ),
    ])
    .await;
    let mut move_input = tiering_input("archive_12m", 12, "ARCHIVE", 300);
    move_input.compression_type = Some("ARCHIVE HIGH".to_owned());
    harness.store_policy(move_input).await;
    refresh_and_evaluate(&harness).await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.merges.len(), 1);
    assert_eq!(report.merges[0].status, MergeStatus::Success);

    let partitions = harness.catalog.partitions(&sales()).await;
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].upper_bound, Some(date(2023, 4, 1)));
}

#[tokio::test]
async fn failed_consolidation_keeps_the_relocation() {
    let harness = tracked_harness(vec![
        snapshot(
            "P_2023",
            Some(date(2023, 1, 1)),
            Some(date(2023, 3, 1)),
            "ARCHIVE",
            CompressionCodec::ArchiveHigh,
        ),
        snapshot(
            "P_2023_03",
            Some(date(2023, 3, 1)),
            Some(date(2023, 4, 1)),
            "USERS",
            CompressionCodec::None,
        ),
    ])
    .await;
    let mut move_input = tiering_input("archive_12m", 12, "ARCHIVE", 300);
    move_input.compression_type = Some("ARCHIVE HIGH".to_owned());
    harness.store_policy(move_input).await;
    refresh_and_evaluate(&harness).await;
    harness.locks.hold(object_lock_key(&sales()).as_str()).await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.merges[0].status, MergeStatus::Failed);

    let partitions = harness.catalog.partitions(&sales()).await;
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[1].location, "ARCHIVE");
    assert_eq!(partitions[1].codec, CompressionCodec::ArchiveHigh);
}

#[tokio::test]
async fn failed_record_update_keeps_the_audit_row_and_the_batch() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    harness.access_records.fail_upserts("P_A").await;

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.bookkeeping_errors, 1);

    assert!(
        harness
            .catalog
            .partitions(&sales())
            .await
            .iter()
            .all(|partition| partition.codec == CompressionCodec::QueryHigh)
    );

    let logs = harness.logs.executions.lock().await.clone();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|entry| entry.status == ExecutionStatus::Success));
    assert!(logs.iter().any(|entry| entry.key == key("P_A")));

    assert!(
        harness
            .queue
            .list_entries(Some(policy.id()))
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn abandoned_claims_are_released_once_the_lease_has_expired() {
    let harness = tracked_harness(vec![aged("P_A", 35), aged("P_B", 40)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    harness
        .queue
        .abandon_claim(policy.id(), &key("P_A"), Duration::hours(1))
        .await;
    harness
        .queue
        .abandon_claim(policy.id(), &key("P_B"), Duration::seconds(5))
        .await;

    let summary = harness
        .evaluation()
        .evaluate(policy.id())
        .await
        .unwrap_or_default();
    assert_eq!(summary.queued, 0);
    assert_eq!(summary.executing, 2);

    let report = harness
        .execution()
        .execute(10, false, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.stale_claims_released, 1);
    assert_eq!(report.planned.len(), 1);
    assert_eq!(report.planned[0].entry.key, key("P_A"));
    assert_eq!(report.succeeded, 1);

    let partitions = harness.catalog.partitions(&sales()).await;
    let codec_of = |name: &str| {
        partitions
            .iter()
            .find(|partition| partition.name == name)
            .map(|partition| partition.codec)
    };
    assert_eq!(codec_of("P_A"), Some(CompressionCodec::QueryHigh));
    assert_eq!(codec_of("P_B"), Some(CompressionCodec::None));

    let still_claimed = harness
        .queue
        .find_entry(policy.id(), &key("P_B"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(still_claimed.status, QueueStatus::Executing);
}

#[tokio::test]
async fn simulate_leaves_abandoned_claims_alone() {
    let harness = tracked_harness(vec![aged("P_A", 35)]).await;
    let policy = harness
        .store_policy(compression_input("compress_30d", 30, 100))
        .await;
    refresh_and_evaluate(&harness).await;
    harness
        .queue
        .abandon_claim(policy.id(), &key("P_A"), Duration::hours(1))
        .await;

    let report = harness
        .execution()
        .execute(10, true, ExecutionScope::All)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(report.stale_claims_released, 0);
    assert!(report.planned.is_empty());

    let entry = harness
        .queue
        .find_entry(policy.id(), &key("P_A"))
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(entry.status, QueueStatus::Executing);
}
