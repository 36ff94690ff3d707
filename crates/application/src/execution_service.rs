use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, LifecycleSettings, PartitionKey, PartitionSnapshot, TransitionTarget,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lifecycle_ports::{
    AccessRecordRepository, EvaluationQueueEntry, EvaluationQueueRepository, ExecutionLogEntry,
    ExecutionLogRepository, ExecutionScope, ExecutionStatus, PartitionCatalog,
    PartitionLockCoordinator, PartitionMergeRecord, SettingsRepository, partition_lock_key,
};
use crate::merge_service::MergeService;

mod planner;

pub use planner::PlannedAction;

/// Result of one execution run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Run identifier stamped on every log row.
    pub run_id: Uuid,
    /// Whether the run only computed the plan.
    pub simulated: bool,
    /// Planned actions in execution order.
    pub planned: Vec<PlannedAction>,
    /// Actions that succeeded.
    pub succeeded: u32,
    /// Actions that failed, including lock timeouts.
    pub failed: u32,
    /// Actions that could not obtain their partition lock.
    pub lock_timeouts: u32,
    /// Lower-priority duplicates left queued.
    pub duplicates_skipped: u32,
    /// Actions whose entry was claimed by another run.
    pub claim_conflicts: u32,
    /// Queue, access-record or log writes that failed around an action.
    pub bookkeeping_errors: u32,
    /// Abandoned EXECUTING entries returned to FAILED before planning.
    pub stale_claims_released: u64,
    /// Whether the emergency stop halted the run.
    pub halted: bool,
    /// Merge attempts triggered by relocations.
    pub merges: Vec<PartitionMergeRecord>,
}

impl ExecutionReport {
    fn new(run_id: Uuid, simulated: bool, planned: Vec<PlannedAction>, duplicates: u32) -> Self {
        Self {
            run_id,
            simulated,
            planned,
            succeeded: 0,
            failed: 0,
            lock_timeouts: 0,
            duplicates_skipped: duplicates,
            claim_conflicts: 0,
            bookkeeping_errors: 0,
            stale_claims_released: 0,
            halted: false,
            merges: Vec::new(),
        }
    }

    fn count_failure(&mut self, error: &AppError) {
        self.failed += 1;
        if error.is_transient() {
            self.lock_timeouts += 1;
        }
    }
}

/// Drains the evaluation queue and performs tier transitions.
#[derive(Clone)]
pub struct ExecutionService {
    catalog: Arc<dyn PartitionCatalog>,
    access_records: Arc<dyn AccessRecordRepository>,
    queue: Arc<dyn EvaluationQueueRepository>,
    execution_log: Arc<dyn ExecutionLogRepository>,
    settings: Arc<dyn SettingsRepository>,
    locks: Arc<dyn PartitionLockCoordinator>,
    merge_service: Option<MergeService>,
    holder_id: String,
}

impl ExecutionService {
    /// Creates an execution service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PartitionCatalog>,
        access_records: Arc<dyn AccessRecordRepository>,
        queue: Arc<dyn EvaluationQueueRepository>,
        execution_log: Arc<dyn ExecutionLogRepository>,
        settings: Arc<dyn SettingsRepository>,
        locks: Arc<dyn PartitionLockCoordinator>,
    ) -> Self {
        Self {
            catalog,
            access_records,
            queue,
            execution_log,
            settings,
            locks,
            merge_service: None,
            holder_id: "execution".to_owned(),
        }
    }

    /// Adds the consolidation hook run after successful relocations.
    #[must_use]
    pub fn with_merge_service(mut self, merge_service: MergeService) -> Self {
        self.merge_service = Some(merge_service);
        self
    }

    /// Sets the lock holder identity.
    #[must_use]
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    /// Executes up to `max_actions` runnable entries in the given scope.
    ///
    /// In simulate mode the plan is computed and nothing is changed or logged.
    pub async fn execute(
        &self,
        max_actions: usize,
        simulate: bool,
        scope: ExecutionScope,
    ) -> AppResult<ExecutionReport> {
        if max_actions == 0 {
            return Err(AppError::Validation(
                "max_actions must be greater than zero".to_owned(),
            ));
        }

        let settings = self.settings.load_settings().await?;
        let run_id = Uuid::new_v4();

        if settings.emergency_stop() && !simulate {
            warn!(run_id = %run_id, "execution halted by emergency stop");
            let mut report = ExecutionReport::new(run_id, simulate, Vec::new(), 0);
            report.halted = true;
            return Ok(report);
        }

        let stale_claims_released = if simulate {
            0
        } else {
            self.release_stale_claims(run_id, &settings).await
        };

        let (planned, duplicates) = self.plan(max_actions, &scope).await?;
        let mut report = ExecutionReport::new(run_id, simulate, planned, duplicates);
        report.stale_claims_released = stale_claims_released;

        if simulate {
            info!(
                run_id = %run_id,
                planned = report.planned.len(),
                duplicates_skipped = duplicates,
                "execution simulated"
            );
            return Ok(report);
        }

        let actions = report.planned.clone();
        for action in actions {
            if self.settings.is_emergency_stopped().await? {
                warn!(run_id = %run_id, "execution halted by emergency stop");
                report.halted = true;
                break;
            }

            let started_at = Utc::now();
            let started = Instant::now();
            if let Err(error) = self
                .execute_action(run_id, &settings, &action, started_at, started, &mut report)
                .await
            {
                warn!(
                    run_id = %run_id,
                    partition = %action.entry.key,
                    error = %error,
                    "execution action aborted"
                );
                self.record_failure(run_id, &action, started_at, started, &error, &mut report)
                    .await;
            }
        }

        info!(
            run_id = %run_id,
            planned = report.planned.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            lock_timeouts = report.lock_timeouts,
            bookkeeping_errors = report.bookkeeping_errors,
            halted = report.halted,
            "execution run completed"
        );

        Ok(report)
    }

    async fn execute_action(
        &self,
        run_id: Uuid,
        settings: &LifecycleSettings,
        action: &PlannedAction,
        started_at: DateTime<Utc>,
        started: Instant,
        report: &mut ExecutionReport,
    ) -> AppResult<()> {
        let entry = &action.entry;
        let scope_key = partition_lock_key(&entry.key);

        let lease = self
            .locks
            .acquire(
                scope_key.as_str(),
                self.holder_id.as_str(),
                settings.lock_lease_seconds(),
                settings.lock_timeout(),
            )
            .await?;
        let Some(lease) = lease else {
            let error = AppError::LockTimeout(format!(
                "partition lock not obtained within {}s",
                settings.lock_timeout_seconds()
            ));
            warn!(run_id = %run_id, partition = %entry.key, "partition lock timed out");
            self.record_failure(run_id, action, started_at, started, &error, report)
                .await;
            return Ok(());
        };

        let result = self
            .execute_locked(run_id, settings, action, started_at, started, report)
            .await;

        if let Err(error) = self.locks.release(&lease).await {
            warn!(partition = %entry.key, error = %error, "failed to release partition lock");
        }

        result
    }

    async fn execute_locked(
        &self,
        run_id: Uuid,
        settings: &LifecycleSettings,
        action: &PlannedAction,
        started_at: DateTime<Utc>,
        started: Instant,
        report: &mut ExecutionReport,
    ) -> AppResult<()> {
        let entry = &action.entry;
        if !self.queue.claim_entry(entry.policy_id, &entry.key).await? {
            report.claim_conflicts += 1;
            return Ok(());
        }

        match self.perform(&entry.key, &entry.target).await {
            Ok(after) => {
                report.succeeded += 1;
                let logged = self
                    .append_log(
                        run_id,
                        action,
                        ExecutionStatus::Success,
                        started_at,
                        started,
                        after.as_ref().map(|snapshot| snapshot.size_bytes),
                        None,
                    )
                    .await;
                if let Err(error) = logged {
                    report.bookkeeping_errors += 1;
                    warn!(
                        run_id = %run_id,
                        partition = %entry.key,
                        error = %error,
                        "failed to append execution log"
                    );
                }
                report.bookkeeping_errors +=
                    self.finish_success(run_id, entry, after.as_ref()).await;

                info!(
                    run_id = %run_id,
                    policy = %entry.policy_name,
                    partition = %entry.key,
                    action = entry.action().as_str(),
                    "partition transition completed"
                );

                if entry.action() == ActionType::Move
                    && settings.auto_merge()
                    && let Some(merge_service) = &self.merge_service
                {
                    match merge_service.merge_with_settings(&entry.key, settings).await {
                        Ok(record) => report.merges.push(record),
                        Err(error) => warn!(
                            partition = %entry.key,
                            error = %error,
                            "post-move merge failed"
                        ),
                    }
                }
            }
            Err(error) => {
                warn!(
                    run_id = %run_id,
                    policy = %entry.policy_name,
                    partition = %entry.key,
                    error = %error,
                    "partition transition failed"
                );
                if let Err(queue_error) = self
                    .queue
                    .fail_entry(entry.policy_id, &entry.key, error.to_string().as_str())
                    .await
                {
                    report.bookkeeping_errors += 1;
                    warn!(
                        partition = %entry.key,
                        error = %queue_error,
                        "failed to mark queue entry failed"
                    );
                }
                self.record_failure(run_id, action, started_at, started, &error, report)
                    .await;
            }
        }

        Ok(())
    }

    /// Consumes the entry and updates the access record; returns the number of failed writes.
    async fn finish_success(
        &self,
        run_id: Uuid,
        entry: &EvaluationQueueEntry,
        after: Option<&PartitionSnapshot>,
    ) -> u32 {
        let mut errors = 0;
        if let Err(error) = self.queue.complete_entry(entry.policy_id, &entry.key).await {
            errors += 1;
            warn!(
                run_id = %run_id,
                partition = %entry.key,
                error = %error,
                "failed to complete queue entry"
            );
        }
        if let Err(error) = self.record_transition(entry, after).await {
            errors += 1;
            warn!(
                run_id = %run_id,
                partition = %entry.key,
                error = %error,
                "failed to record partition transition"
            );
        }
        errors
    }

    async fn record_failure(
        &self,
        run_id: Uuid,
        action: &PlannedAction,
        started_at: DateTime<Utc>,
        started: Instant,
        error: &AppError,
        report: &mut ExecutionReport,
    ) {
        report.count_failure(error);
        let logged = self
            .append_log(
                run_id,
                action,
                ExecutionStatus::Failed,
                started_at,
                started,
                None,
                Some((error.kind().to_owned(), error.to_string())),
            )
            .await;
        if let Err(log_error) = logged {
            report.bookkeeping_errors += 1;
            warn!(
                run_id = %run_id,
                partition = %action.entry.key,
                error = %log_error,
                "failed to append execution log"
            );
        }
    }

    async fn release_stale_claims(&self, run_id: Uuid, settings: &LifecycleSettings) -> u64 {
        let claimed_before =
            Utc::now() - Duration::seconds(i64::from(settings.lock_lease_seconds()));
        match self.queue.release_stale_claims(claimed_before).await {
            Ok(0) => 0,
            Ok(released) => {
                warn!(run_id = %run_id, released, "released abandoned executing queue entries");
                released
            }
            Err(error) => {
                warn!(
                    run_id = %run_id,
                    error = %error,
                    "failed to release abandoned queue entries"
                );
                0
            }
        }
    }

    async fn perform(
        &self,
        key: &PartitionKey,
        target: &TransitionTarget,
    ) -> AppResult<Option<PartitionSnapshot>> {
        match target {
            TransitionTarget::Compress { codec } => {
                self.catalog.recompress(key, *codec).await.map(Some)
            }
            TransitionTarget::Move { location, codec } => self
                .catalog
                .relocate(key, location.as_str(), *codec)
                .await
                .map(Some),
            TransitionTarget::Drop => self.catalog.drop_partition(key).await.map(|()| None),
            TransitionTarget::Truncate => self.catalog.truncate_partition(key).await.map(Some),
        }
    }

    async fn record_transition(
        &self,
        entry: &EvaluationQueueEntry,
        after: Option<&PartitionSnapshot>,
    ) -> AppResult<()> {
        let Some(after) = after else {
            self.access_records.delete_record(&entry.key).await?;
            self.queue.delete_partition_entries(&entry.key).await?;
            return Ok(());
        };

        if let Some(record) = self.access_records.find_record(&entry.key).await? {
            let updated = record.after_transition(
                after.codec,
                after.location.as_str(),
                after.row_count,
                after.size_bytes,
                Utc::now(),
            );
            self.access_records.upsert_record(updated).await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_log(
        &self,
        run_id: Uuid,
        action: &PlannedAction,
        status: ExecutionStatus,
        started_at: DateTime<Utc>,
        started: Instant,
        size_after_bytes: Option<i64>,
        error: Option<(String, String)>,
    ) -> AppResult<()> {
        let entry = &action.entry;
        let size_before_bytes = action.size_before_bytes;
        let compression_ratio = match (size_before_bytes, size_after_bytes) {
            (Some(before), Some(after)) if after > 0 => Some(before as f64 / after as f64),
            _ => None,
        };
        let (error_kind, error_detail) = error.unzip();

        self.execution_log
            .append_execution(ExecutionLogEntry {
                run_id,
                policy_id: entry.policy_id,
                policy_name: entry.policy_name.clone(),
                key: entry.key.clone(),
                action: entry.action(),
                status,
                started_at,
                finished_at: Utc::now(),
                duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
                size_before_bytes,
                size_after_bytes,
                compression_ratio,
                error_kind,
                error_detail,
            })
            .await
    }
}

#[cfg(test)]
mod tests;
