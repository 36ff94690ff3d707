use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, CompressionCodec, LifecycleSettings, ObjectRef, PartitionAccessRecord,
    PartitionKey, PartitionSnapshot, Policy, PolicyId, PolicyInput, PolicyTemplate, PolicyType,
    ThresholdProfile,
};

use crate::lifecycle_ports::{
    AccessRecordRepository, AuditLogQuery, EvaluationQueueEntry, EvaluationQueueRepository,
    ExecutionLogEntry, ExecutionLogRepository, ExecutionScope, LockLease, MergeDestination,
    MergeLogRepository, ObjectDescriptor, PartitionCatalog, PartitionLockCoordinator,
    PartitionMergeRecord, PolicyRepository, QueueEntryUpsert, QueueMergeOutcome, QueueStatus,
    SettingsRepository, TaskRun, TaskRunRepository,
};
use crate::{
    EvaluationService, ExecutionService, MergeService, PolicyService, SchedulerService,
    TrackingService,
};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| unreachable!())
}

pub fn sales() -> ObjectRef {
    ObjectRef::new("dwh", "sales_fact").unwrap_or_else(|_| unreachable!())
}

pub fn key(partition: &str) -> PartitionKey {
    sales().partition(partition).unwrap_or_else(|_| unreachable!())
}

pub fn snapshot(
    name: &str,
    lower_bound: Option<NaiveDate>,
    upper_bound: Option<NaiveDate>,
    location: &str,
    codec: CompressionCodec,
) -> PartitionSnapshot {
    PartitionSnapshot {
        name: name.to_owned(),
        lower_bound,
        upper_bound,
        location: location.to_owned(),
        codec,
        row_count: 1_000,
        size_bytes: 64 * 1024 * 1024,
        heat: None,
    }
}

pub fn compression_input(name: &str, age_days: i64, priority: i64) -> PolicyInput {
    PolicyInput {
        name: name.to_owned(),
        owner: "dwh".to_owned(),
        object: "sales_fact".to_owned(),
        policy_type: PolicyType::Compression,
        action_type: ActionType::Compress,
        age_days: Some(age_days),
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

pub fn tiering_input(name: &str, age_months: i64, location: &str, priority: i64) -> PolicyInput {
    PolicyInput {
        name: name.to_owned(),
        owner: "dwh".to_owned(),
        object: "sales_fact".to_owned(),
        policy_type: PolicyType::Tiering,
        action_type: ActionType::Move,
        age_days: None,
        age_months: Some(age_months),
        access_pattern: None,
        size_threshold_mb: None,
        custom_condition: None,
        compression_type: None,
        target_location: Some(location.to_owned()),
        priority,
        enabled: true,
        threshold_profile: None,
    }
}

pub fn policy(input: PolicyInput) -> Policy {
    Policy::new(PolicyId::new(), input).unwrap_or_else(|_| unreachable!())
}

#[derive(Default)]
struct CatalogState {
    objects: HashMap<ObjectRef, (bool, Vec<PartitionSnapshot>)>,
    locations: HashSet<String>,
    failing: HashSet<String>,
}

/// In-memory catalog with injectable per-partition failures.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    pub async fn add_object(&self, object: ObjectRef, partitioned: bool, partitions: Vec<PartitionSnapshot>) {
        let mut state = self.state.lock().await;
        for partition in &partitions {
            state.locations.insert(partition.location.to_ascii_uppercase());
        }
        state.objects.insert(object, (partitioned, partitions));
    }

    pub async fn add_location(&self, location: &str) {
        self.state
            .lock()
            .await
            .locations
            .insert(location.to_ascii_uppercase());
    }

    pub async fn fail_partition(&self, partition: &str) {
        self.state
            .lock()
            .await
            .failing
            .insert(partition.to_ascii_uppercase());
    }

    pub async fn partitions(&self, object: &ObjectRef) -> Vec<PartitionSnapshot> {
        self.state
            .lock()
            .await
            .objects
            .get(object)
            .map(|(_, partitions)| partitions.clone())
            .unwrap_or_default()
    }

    async fn mutate(
        &self,
        key: &PartitionKey,
        change: impl FnOnce(&mut PartitionSnapshot),
    ) -> AppResult<PartitionSnapshot> {
        let mut state = self.state.lock().await;
        if state.failing.contains(key.partition()) {
            return Err(AppError::Internal(format!(
                "storage error while changing '{key}'"
            )));
        }

        let partition = state
            .objects
            .get_mut(key.object())
            .and_then(|(_, partitions)| {
                partitions
                    .iter_mut()
                    .find(|partition| partition.name.eq_ignore_ascii_case(key.partition()))
            })
            .ok_or_else(|| AppError::NotFound(format!("partition '{key}' does not exist")))?;
        change(partition);
        Ok(partition.clone())
    }
}

#[async_trait]
impl PartitionCatalog for FakeCatalog {
    async fn find_object(&self, object: &ObjectRef) -> AppResult<Option<ObjectDescriptor>> {
        Ok(self
            .state
            .lock()
            .await
            .objects
            .get(object)
            .map(|(partitioned, _)| ObjectDescriptor {
                object: object.clone(),
                partitioned: *partitioned,
            }))
    }

    async fn list_partitions(&self, object: &ObjectRef) -> AppResult<Vec<PartitionSnapshot>> {
        Ok(self.partitions(object).await)
    }

    async fn location_exists(&self, location: &str) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .locations
            .contains(&location.to_ascii_uppercase()))
    }

    async fn recompress(
        &self,
        key: &PartitionKey,
        codec: CompressionCodec,
    ) -> AppResult<PartitionSnapshot> {
        self.mutate(key, |partition| {
            partition.size_bytes /= 4;
            partition.codec = codec;
        })
        .await
    }

    async fn relocate(
        &self,
        key: &PartitionKey,
        location: &str,
        codec: Option<CompressionCodec>,
    ) -> AppResult<PartitionSnapshot> {
        self.mutate(key, |partition| {
            partition.location = location.to_ascii_uppercase();
            if let Some(codec) = codec {
                partition.codec = codec;
            }
        })
        .await
    }

    async fn drop_partition(&self, key: &PartitionKey) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.failing.contains(key.partition()) {
            return Err(AppError::Internal(format!("storage error while dropping '{key}'")));
        }
        if let Some((_, partitions)) = state.objects.get_mut(key.object()) {
            partitions.retain(|partition| !partition.name.eq_ignore_ascii_case(key.partition()));
        }
        Ok(())
    }

    async fn truncate_partition(&self, key: &PartitionKey) -> AppResult<PartitionSnapshot> {
        self.mutate(key, |partition| {
            partition.row_count = 0;
            partition.size_bytes = 0;
        })
        .await
    }

    async fn merge_partition(
        &self,
        source: &PartitionKey,
        destination: &MergeDestination,
    ) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        if state.failing.contains(source.partition()) {
            return Err(AppError::Internal(format!("storage error while merging '{source}'")));
        }

        let (_, partitions) = state
            .objects
            .get_mut(source.object())
            .ok_or_else(|| AppError::NotFound(format!("object '{}' does not exist", source.object())))?;
        let position = partitions
            .iter()
            .position(|partition| partition.name.eq_ignore_ascii_case(source.partition()))
            .ok_or_else(|| AppError::NotFound(format!("partition '{source}' does not exist")))?;

        match destination {
            MergeDestination::Rename { name } => {
                let partition = &mut partitions[position];
                partition.name = name.clone();
                Ok(partition.row_count)
            }
            MergeDestination::Existing { name } => {
                if !partitions
                    .iter()
                    .any(|partition| partition.name.eq_ignore_ascii_case(name))
                {
                    return Err(AppError::NotFound(format!("partition '{name}' does not exist")));
                }
                let merged = partitions.remove(position);
                let target = partitions
                    .iter_mut()
                    .find(|partition| partition.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| AppError::NotFound(format!("partition '{name}' does not exist")))?;
                target.upper_bound = merged.upper_bound;
                target.row_count += merged.row_count;
                target.size_bytes += merged.size_bytes;
                Ok(merged.row_count)
            }
        }
    }
}

#[derive(Default)]
pub struct FakePolicyRepository {
    policies: Mutex<HashMap<PolicyId, Policy>>,
    profiles: Mutex<HashMap<String, ThresholdProfile>>,
    templates: Mutex<HashMap<String, PolicyTemplate>>,
}

#[async_trait]
impl PolicyRepository for FakePolicyRepository {
    async fn create_policy(&self, policy: Policy) -> AppResult<()> {
        self.policies.lock().await.insert(policy.id(), policy);
        Ok(())
    }

    async fn create_policies(&self, policies: Vec<Policy>) -> AppResult<()> {
        let mut stored = self.policies.lock().await;
        for policy in policies {
            stored.insert(policy.id(), policy);
        }
        Ok(())
    }

    async fn update_policy(&self, policy: Policy) -> AppResult<()> {
        self.policies.lock().await.insert(policy.id(), policy);
        Ok(())
    }

    async fn delete_policy(&self, policy_id: PolicyId) -> AppResult<()> {
        self.policies.lock().await.remove(&policy_id);
        Ok(())
    }

    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<Option<Policy>> {
        Ok(self.policies.lock().await.get(&policy_id).cloned())
    }

    async fn find_policy_by_name(&self, name: &str) -> AppResult<Option<Policy>> {
        Ok(self
            .policies
            .lock()
            .await
            .values()
            .find(|policy| policy.name().as_str() == name)
            .cloned())
    }

    async fn list_policies(&self) -> AppResult<Vec<Policy>> {
        let mut policies: Vec<Policy> = self.policies.lock().await.values().cloned().collect();
        policies.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(policies)
    }

    async fn list_enabled_policies(&self) -> AppResult<Vec<Policy>> {
        Ok(self
            .list_policies()
            .await?
            .into_iter()
            .filter(Policy::is_enabled)
            .collect())
    }

    async fn save_profile(&self, profile: ThresholdProfile) -> AppResult<()> {
        self.profiles
            .lock()
            .await
            .insert(profile.name().as_str().to_owned(), profile);
        Ok(())
    }

    async fn find_profile(&self, name: &str) -> AppResult<Option<ThresholdProfile>> {
        Ok(self.profiles.lock().await.get(name).cloned())
    }

    async fn list_profiles(&self) -> AppResult<Vec<ThresholdProfile>> {
        Ok(self.profiles.lock().await.values().cloned().collect())
    }

    async fn delete_profile(&self, name: &str) -> AppResult<()> {
        self.profiles.lock().await.remove(name);
        Ok(())
    }

    async fn save_template(&self, template: PolicyTemplate) -> AppResult<()> {
        self.templates
            .lock()
            .await
            .insert(template.name().as_str().to_owned(), template);
        Ok(())
    }

    async fn find_template(&self, name: &str) -> AppResult<Option<PolicyTemplate>> {
        Ok(self.templates.lock().await.get(name).cloned())
    }

    async fn list_templates(&self) -> AppResult<Vec<PolicyTemplate>> {
        Ok(self.templates.lock().await.values().cloned().collect())
    }

    async fn delete_template(&self, name: &str) -> AppResult<()> {
        self.templates.lock().await.remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAccessRecords {
    records: Mutex<HashMap<PartitionKey, PartitionAccessRecord>>,
    failing_upserts: Mutex<HashSet<String>>,
}

impl FakeAccessRecords {
    /// Makes every later upsert of the partition fail.
    pub async fn fail_upserts(&self, partition: &str) {
        self.failing_upserts.lock().await.insert(partition.to_owned());
    }
}

#[async_trait]
impl AccessRecordRepository for FakeAccessRecords {
    async fn upsert_record(&self, record: PartitionAccessRecord) -> AppResult<()> {
        if self.failing_upserts.lock().await.contains(record.key.partition()) {
            return Err(AppError::Internal(format!(
                "connection reset while saving '{}'",
                record.key
            )));
        }
        self.records.lock().await.insert(record.key.clone(), record);
        Ok(())
    }

    async fn find_record(&self, key: &PartitionKey) -> AppResult<Option<PartitionAccessRecord>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn list_records(&self, object: &ObjectRef) -> AppResult<Vec<PartitionAccessRecord>> {
        let mut records: Vec<PartitionAccessRecord> = self
            .records
            .lock()
            .await
            .values()
            .filter(|record| record.key.object() == object)
            .cloned()
            .collect();
        records.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(records)
    }

    async fn delete_record(&self, key: &PartitionKey) -> AppResult<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}

/// Queue fake that enforces the status compare-and-swap rules.
#[derive(Default)]
pub struct FakeQueue {
    entries: Mutex<HashMap<(PolicyId, PartitionKey), EvaluationQueueEntry>>,
}

const STALE_CLAIM_MESSAGE: &str = "execution claim expired before completion";

impl FakeQueue {
    /// Leaves an entry as an abandoned claim last touched `age` ago.
    pub async fn abandon_claim(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        age: chrono::Duration,
    ) {
        if let Some(entry) = self
            .entries
            .lock()
            .await
            .get_mut(&(policy_id, key.clone()))
        {
            entry.status = QueueStatus::Executing;
            entry.updated_at = Utc::now() - age;
        }
    }

    pub async fn set_status(&self, policy_id: PolicyId, key: &PartitionKey, status: QueueStatus) {
        if let Some(entry) = self
            .entries
            .lock()
            .await
            .get_mut(&(policy_id, key.clone()))
        {
            entry.status = status;
        }
    }
}

#[async_trait]
impl EvaluationQueueRepository for FakeQueue {
    async fn merge_entry(&self, entry: QueueEntryUpsert) -> AppResult<QueueMergeOutcome> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();
        match entries.get_mut(&(entry.policy_id, entry.key.clone())) {
            Some(existing) if existing.status == QueueStatus::Executing => {
                Ok(QueueMergeOutcome::SkippedExecuting)
            }
            Some(existing) => {
                existing.policy_name = entry.policy_name;
                existing.eligible = true;
                existing.target = entry.target;
                existing.priority = entry.priority;
                existing.status = QueueStatus::Pending;
                existing.updated_at = now;
                Ok(QueueMergeOutcome::Updated)
            }
            None => {
                entries.insert(
                    (entry.policy_id, entry.key.clone()),
                    EvaluationQueueEntry {
                        policy_id: entry.policy_id,
                        policy_name: entry.policy_name,
                        key: entry.key,
                        eligible: true,
                        target: entry.target,
                        priority: entry.priority,
                        status: QueueStatus::Pending,
                        attempts: 0,
                        last_error: None,
                        queued_at: now,
                        updated_at: now,
                    },
                );
                Ok(QueueMergeOutcome::Inserted)
            }
        }
    }

    async fn mark_ineligible(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        reason: &str,
    ) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&(policy_id, key.clone())) {
            Some(entry)
                if entry.status != QueueStatus::Executing
                    && (entry.eligible || entry.status != QueueStatus::Skipped) =>
            {
                entry.eligible = false;
                entry.status = QueueStatus::Skipped;
                entry.last_error = Some(reason.to_owned());
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<Option<EvaluationQueueEntry>> {
        Ok(self.entries.lock().await.get(&(policy_id, key.clone())).cloned())
    }

    async fn list_runnable(&self, scope: &ExecutionScope) -> AppResult<Vec<EvaluationQueueEntry>> {
        let mut entries: Vec<EvaluationQueueEntry> = self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_runnable() && scope.includes(entry))
            .cloned()
            .collect();
        entries.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.queued_at.cmp(&right.queued_at))
                .then_with(|| left.key.cmp(&right.key))
        });
        Ok(entries)
    }

    async fn list_entries(
        &self,
        policy_id: Option<PolicyId>,
    ) -> AppResult<Vec<EvaluationQueueEntry>> {
        let mut entries: Vec<EvaluationQueueEntry> = self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| policy_id.is_none_or(|policy_id| entry.policy_id == policy_id))
            .cloned()
            .collect();
        entries.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(entries)
    }

    async fn claim_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&(policy_id, key.clone())) {
            Some(entry) if entry.is_runnable() => {
                entry.status = QueueStatus::Executing;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        if entries
            .get(&(policy_id, key.clone()))
            .is_some_and(|entry| entry.status == QueueStatus::Executing)
        {
            entries.remove(&(policy_id, key.clone()));
        }
        Ok(())
    }

    async fn fail_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        error_message: &str,
    ) -> AppResult<()> {
        if let Some(entry) = self
            .entries
            .lock()
            .await
            .get_mut(&(policy_id, key.clone()))
            .filter(|entry| entry.status == QueueStatus::Executing)
        {
            entry.status = QueueStatus::Failed;
            entry.attempts += 1;
            entry.last_error = Some(error_message.to_owned());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> AppResult<u64> {
        let mut released = 0;
        for entry in self.entries.lock().await.values_mut().filter(|entry| {
            entry.status == QueueStatus::Executing && entry.updated_at < claimed_before
        }) {
            entry.status = QueueStatus::Failed;
            entry.attempts += 1;
            entry.last_error = Some(STALE_CLAIM_MESSAGE.to_owned());
            entry.updated_at = Utc::now();
            released += 1;
        }
        Ok(released)
    }

    async fn delete_partition_entries(&self, key: &PartitionKey) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|(_, entry_key), _| entry_key != key);
        Ok((before - entries.len()) as u64)
    }

    async fn delete_policy_entries(&self, policy_id: PolicyId) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|(entry_policy, _), _| *entry_policy != policy_id);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakeAuditLogs {
    pub executions: Mutex<Vec<ExecutionLogEntry>>,
    pub merges: Mutex<Vec<PartitionMergeRecord>>,
}

#[async_trait]
impl ExecutionLogRepository for FakeAuditLogs {
    async fn append_execution(&self, entry: ExecutionLogEntry) -> AppResult<()> {
        self.executions.lock().await.push(entry);
        Ok(())
    }

    async fn list_executions(&self, query: AuditLogQuery) -> AppResult<Vec<ExecutionLogEntry>> {
        let mut entries: Vec<ExecutionLogEntry> = self
            .executions
            .lock()
            .await
            .iter()
            .rev()
            .filter(|entry| {
                query
                    .object
                    .as_ref()
                    .is_none_or(|object| entry.key.object() == object)
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

#[async_trait]
impl MergeLogRepository for FakeAuditLogs {
    async fn append_merge(&self, record: PartitionMergeRecord) -> AppResult<()> {
        self.merges.lock().await.push(record);
        Ok(())
    }

    async fn list_merges(&self, query: AuditLogQuery) -> AppResult<Vec<PartitionMergeRecord>> {
        let mut records: Vec<PartitionMergeRecord> = self
            .merges
            .lock()
            .await
            .iter()
            .rev()
            .filter(|record| query.object.as_ref().is_none_or(|object| &record.object == object))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

/// Settings fake whose emergency stop can engage after a number of checks.
#[derive(Default)]
pub struct FakeSettings {
    settings: Mutex<LifecycleSettings>,
    stop_after_checks: Mutex<Option<u32>>,
}

impl FakeSettings {
    pub async fn set(&self, settings: LifecycleSettings) {
        *self.settings.lock().await = settings;
    }

    pub async fn stop_after_checks(&self, checks: u32) {
        *self.stop_after_checks.lock().await = Some(checks);
    }
}

#[async_trait]
impl SettingsRepository for FakeSettings {
    async fn load_settings(&self) -> AppResult<LifecycleSettings> {
        Ok(*self.settings.lock().await)
    }

    async fn save_settings(&self, settings: LifecycleSettings) -> AppResult<()> {
        *self.settings.lock().await = settings;
        Ok(())
    }

    async fn is_emergency_stopped(&self) -> AppResult<bool> {
        let mut remaining = self.stop_after_checks.lock().await;
        if let Some(checks) = remaining.as_mut() {
            if *checks == 0 {
                return Ok(true);
            }
            *checks -= 1;
        }
        Ok(self.settings.lock().await.emergency_stop())
    }
}

/// Lock fake that never waits; a held scope times out immediately.
#[derive(Default)]
pub struct FakeLocks {
    held: Mutex<HashMap<String, LockLease>>,
    acquired: Mutex<Vec<String>>,
}

impl FakeLocks {
    pub async fn hold(&self, scope_key: &str) {
        self.held.lock().await.insert(
            scope_key.to_owned(),
            LockLease {
                scope_key: scope_key.to_owned(),
                token: "foreign".to_owned(),
                holder_id: "someone-else".to_owned(),
            },
        );
    }

    pub async fn acquired(&self) -> Vec<String> {
        self.acquired.lock().await.clone()
    }

    pub async fn held_count(&self) -> usize {
        self.held.lock().await.len()
    }
}

#[async_trait]
impl PartitionLockCoordinator for FakeLocks {
    async fn acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
        _wait: Duration,
    ) -> AppResult<Option<LockLease>> {
        let mut held = self.held.lock().await;
        if held.contains_key(scope_key) {
            return Ok(None);
        }

        let lease = LockLease {
            scope_key: scope_key.to_owned(),
            token: format!("{scope_key}:{holder_id}"),
            holder_id: holder_id.to_owned(),
        };
        held.insert(scope_key.to_owned(), lease.clone());
        self.acquired.lock().await.push(scope_key.to_owned());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &LockLease) -> AppResult<()> {
        let mut held = self.held.lock().await;
        if held
            .get(lease.scope_key.as_str())
            .is_some_and(|current| current.token == lease.token)
        {
            held.remove(lease.scope_key.as_str());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTaskRuns {
    runs: Mutex<HashMap<String, TaskRun>>,
}

#[async_trait]
impl TaskRunRepository for FakeTaskRuns {
    async fn save_task_run(&self, run: TaskRun) -> AppResult<()> {
        self.runs.lock().await.insert(run.task_name.clone(), run);
        Ok(())
    }

    async fn list_task_runs(&self) -> AppResult<Vec<TaskRun>> {
        let mut runs: Vec<TaskRun> = self.runs.lock().await.values().cloned().collect();
        runs.sort_by(|left, right| left.task_name.cmp(&right.task_name));
        Ok(runs)
    }
}

/// Every fake wired together.
#[derive(Default)]
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub policies: Arc<FakePolicyRepository>,
    pub access_records: Arc<FakeAccessRecords>,
    pub queue: Arc<FakeQueue>,
    pub logs: Arc<FakeAuditLogs>,
    pub settings: Arc<FakeSettings>,
    pub locks: Arc<FakeLocks>,
    pub task_runs: Arc<FakeTaskRuns>,
}

impl Harness {
    pub fn tracking(&self) -> TrackingService {
        TrackingService::new(
            self.catalog.clone(),
            self.access_records.clone(),
            self.policies.clone(),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub fn policy_service(&self) -> PolicyService {
        PolicyService::new(self.catalog.clone(), self.policies.clone(), self.queue.clone())
    }

    pub fn evaluation(&self) -> EvaluationService {
        EvaluationService::new(
            self.policies.clone(),
            self.access_records.clone(),
            self.queue.clone(),
            self.settings.clone(),
        )
    }

    pub fn merge(&self) -> MergeService {
        MergeService::new(
            self.catalog.clone(),
            self.access_records.clone(),
            self.queue.clone(),
            self.logs.clone(),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub fn execution(&self) -> ExecutionService {
        ExecutionService::new(
            self.catalog.clone(),
            self.access_records.clone(),
            self.queue.clone(),
            self.logs.clone(),
            self.settings.clone(),
            self.locks.clone(),
        )
        .with_merge_service(self.merge())
    }

    pub fn scheduler(&self) -> SchedulerService {
        SchedulerService::new(
            self.tracking(),
            self.evaluation(),
            self.execution(),
            self.settings.clone(),
            self.task_runs.clone(),
        )
    }

    /// Stores a policy directly, bypassing validation.
    pub async fn store_policy(&self, input: PolicyInput) -> Policy {
        let policy = policy(input);
        let stored = self.policies.create_policy(policy.clone()).await;
        assert!(stored.is_ok());
        policy
    }
}
