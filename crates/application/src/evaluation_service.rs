use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use strata_core::{AppError, AppResult};
use strata_domain::{LifecycleSettings, Policy, PolicyId};
use tracing::{info, warn};

use crate::lifecycle_ports::{
    AccessRecordRepository, EvaluationQueueRepository, PolicyRepository, QueueEntryUpsert,
    QueueMergeOutcome, SettingsRepository,
};
use crate::threshold_resolver::ThresholdResolver;

const ALREADY_AT_TARGET: &str = "partition already at target state";
const CONDITIONS_NOT_MET: &str = "trigger conditions not met";

/// Counters of one evaluation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    /// Policies evaluated.
    pub policies: u32,
    /// Policies whose evaluation failed.
    pub failed_policies: u32,
    /// Partitions inspected.
    pub partitions: u32,
    /// Entries inserted or reset to PENDING.
    pub queued: u32,
    /// Existing entries turned into ineligible markers.
    pub marked_ineligible: u32,
    /// Partitions already at the target state.
    pub already_satisfied: u32,
    /// Eligible partitions whose entry is executing.
    pub executing: u32,
    /// Partitions skipped after an error.
    pub skipped: u32,
}

impl EvaluationSummary {
    fn absorb(&mut self, other: Self) {
        self.policies += other.policies;
        self.failed_policies += other.failed_policies;
        self.partitions += other.partitions;
        self.queued += other.queued;
        self.marked_ineligible += other.marked_ineligible;
        self.already_satisfied += other.already_satisfied;
        self.executing += other.executing;
        self.skipped += other.skipped;
    }
}

/// Matches tracked partitions against enabled policies and fills the queue.
#[derive(Clone)]
pub struct EvaluationService {
    policies: Arc<dyn PolicyRepository>,
    access_records: Arc<dyn AccessRecordRepository>,
    queue: Arc<dyn EvaluationQueueRepository>,
    settings: Arc<dyn SettingsRepository>,
    resolver: ThresholdResolver,
}

impl EvaluationService {
    /// Creates an evaluation service.
    #[must_use]
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        access_records: Arc<dyn AccessRecordRepository>,
        queue: Arc<dyn EvaluationQueueRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            resolver: ThresholdResolver::new(policies.clone()),
            policies,
            access_records,
            queue,
            settings,
        }
    }

    /// Evaluates one enabled policy.
    pub async fn evaluate(&self, policy_id: PolicyId) -> AppResult<EvaluationSummary> {
        let policy = self
            .policies
            .find_policy(policy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("policy '{policy_id}' does not exist")))?;
        if !policy.is_enabled() {
            return Err(AppError::Conflict(format!(
                "policy '{}' is disabled",
                policy.name()
            )));
        }

        let settings = self.settings.load_settings().await?;
        self.evaluate_policy(&policy, &settings).await
    }

    /// Evaluates every enabled policy in ascending priority order.
    ///
    /// One policy's failure is logged and does not block the others.
    pub async fn evaluate_all(&self) -> AppResult<EvaluationSummary> {
        let settings = self.settings.load_settings().await?;
        let mut policies = self.policies.list_enabled_policies().await?;
        policies.sort_by(|left, right| {
            left.priority()
                .cmp(&right.priority())
                .then_with(|| left.name().cmp(right.name()))
        });

        let mut summary = EvaluationSummary::default();
        for policy in policies {
            match self.evaluate_policy(&policy, &settings).await {
                Ok(policy_summary) => summary.absorb(policy_summary),
                Err(error) => {
                    summary.failed_policies += 1;
                    warn!(
                        policy_id = %policy.id(),
                        policy = %policy.name(),
                        error = %error,
                        "policy evaluation failed"
                    );
                }
            }
        }

        info!(
            policies = summary.policies,
            failed_policies = summary.failed_policies,
            queued = summary.queued,
            marked_ineligible = summary.marked_ineligible,
            "policy evaluation completed"
        );

        Ok(summary)
    }

    async fn evaluate_policy(
        &self,
        policy: &Policy,
        settings: &LifecycleSettings,
    ) -> AppResult<EvaluationSummary> {
        let thresholds = self.resolver.resolve(policy, settings).await?;
        let records = self.access_records.list_records(policy.target()).await?;
        let target = policy.transition_target();
        let now = Utc::now();

        let mut summary = EvaluationSummary {
            policies: 1,
            ..EvaluationSummary::default()
        };

        for record in records {
            summary.partitions += 1;

            if target.is_satisfied_by(record.codec, record.location.as_str(), record.row_count) {
                summary.already_satisfied += 1;
                if self
                    .queue
                    .mark_ineligible(policy.id(), &record.key, ALREADY_AT_TARGET)
                    .await?
                {
                    summary.marked_ineligible += 1;
                }
                continue;
            }

            let facts = record.facts(thresholds, settings.frozen_split(), now);
            let eligible = match policy.trigger().matches(&facts) {
                Ok(eligible) => eligible,
                Err(error) => {
                    summary.skipped += 1;
                    warn!(
                        policy = %policy.name(),
                        partition = %record.key,
                        error = %error,
                        "partition skipped during evaluation"
                    );
                    continue;
                }
            };

            if !eligible {
                if self
                    .queue
                    .mark_ineligible(policy.id(), &record.key, CONDITIONS_NOT_MET)
                    .await?
                {
                    summary.marked_ineligible += 1;
                }
                continue;
            }

            let outcome = self
                .queue
                .merge_entry(QueueEntryUpsert {
                    policy_id: policy.id(),
                    policy_name: policy.name().as_str().to_owned(),
                    key: record.key.clone(),
                    target: target.clone(),
                    priority: policy.priority(),
                })
                .await?;
            match outcome {
                QueueMergeOutcome::Inserted | QueueMergeOutcome::Updated => summary.queued += 1,
                QueueMergeOutcome::SkippedExecuting => summary.executing += 1,
            }
        }

        Ok(summary)
    }
}
