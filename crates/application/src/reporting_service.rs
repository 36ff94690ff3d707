use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use strata_core::AppResult;
use strata_domain::PolicyId;

use crate::lifecycle_ports::{
    AuditLogQuery, ExecutionLogEntry, ExecutionLogRepository, ExecutionStatus, MergeLogRepository,
    MergeStatus, PartitionMergeRecord,
};

/// Rollup over execution attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionSummary {
    /// Attempts counted.
    pub total: u64,
    /// Successful attempts.
    pub succeeded: u64,
    /// Failed attempts.
    pub failed: u64,
    /// Failed attempts caused by lock timeouts.
    pub lock_timeouts: u64,
    /// Mean compression ratio over successful attempts that report one.
    pub average_compression_ratio: Option<f64>,
    /// Bytes reclaimed by successful attempts.
    pub bytes_saved: i64,
}

/// Per-policy effectiveness rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyEffectiveness {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Policy name at execution time.
    pub policy_name: String,
    /// Execution rollup for the policy.
    pub summary: ExecutionSummary,
}

/// Rollup over merge attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Successful merges.
    pub succeeded: u64,
    /// Failed merges.
    pub failed: u64,
    /// Skipped merges.
    pub skipped: u64,
    /// Rows moved by successful merges.
    pub rows_merged: i64,
}

/// Summarizes execution attempts.
#[must_use]
pub fn summarize_executions<'a>(
    entries: impl IntoIterator<Item = &'a ExecutionLogEntry>,
) -> ExecutionSummary {
    let mut summary = ExecutionSummary::default();
    let mut ratio_sum = 0.0;
    let mut ratio_count = 0_u32;

    for entry in entries {
        summary.total += 1;
        match entry.status {
            ExecutionStatus::Success => {
                summary.succeeded += 1;
                if let Some(ratio) = entry.compression_ratio {
                    ratio_sum += ratio;
                    ratio_count += 1;
                }
                if let (Some(before), Some(after)) =
                    (entry.size_before_bytes, entry.size_after_bytes)
                {
                    summary.bytes_saved += before - after;
                } else if let Some(before) = entry.size_before_bytes
                    && entry.size_after_bytes.is_none()
                    && entry.action == strata_domain::ActionType::Drop
                {
                    summary.bytes_saved += before;
                }
            }
            ExecutionStatus::Failed => {
                summary.failed += 1;
                if entry.error_kind.as_deref() == Some("lock_timeout") {
                    summary.lock_timeouts += 1;
                }
            }
        }
    }

    summary.average_compression_ratio =
        (ratio_count > 0).then(|| ratio_sum / f64::from(ratio_count));
    summary
}

/// Groups execution attempts by policy.
#[must_use]
pub fn policy_effectiveness(entries: &[ExecutionLogEntry]) -> Vec<PolicyEffectiveness> {
    let mut grouped: BTreeMap<PolicyId, Vec<&ExecutionLogEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.policy_id).or_default().push(entry);
    }

    let mut rollups: Vec<PolicyEffectiveness> = grouped
        .into_values()
        .filter_map(|group| {
            let first = group.first()?;
            Some(PolicyEffectiveness {
                policy_id: first.policy_id,
                policy_name: first.policy_name.clone(),
                summary: summarize_executions(group.iter().copied()),
            })
        })
        .collect();
    rollups.sort_by(|left, right| {
        right
            .summary
            .bytes_saved
            .cmp(&left.summary.bytes_saved)
            .then_with(|| left.policy_name.cmp(&right.policy_name))
    });

    rollups
}

/// Summarizes merge attempts.
#[must_use]
pub fn summarize_merges(records: &[PartitionMergeRecord]) -> MergeSummary {
    records
        .iter()
        .fold(MergeSummary::default(), |mut summary, record| {
            match record.status {
                MergeStatus::Success => {
                    summary.succeeded += 1;
                    summary.rows_merged += record.rows_merged;
                }
                MergeStatus::Failed => summary.failed += 1,
                MergeStatus::Skipped => summary.skipped += 1,
            }
            summary
        })
}

/// Read-only lifecycle rollups over the audit logs.
#[derive(Clone)]
pub struct ReportingService {
    execution_log: Arc<dyn ExecutionLogRepository>,
    merge_log: Arc<dyn MergeLogRepository>,
}

impl ReportingService {
    /// Creates a reporting service.
    #[must_use]
    pub fn new(
        execution_log: Arc<dyn ExecutionLogRepository>,
        merge_log: Arc<dyn MergeLogRepository>,
    ) -> Self {
        Self {
            execution_log,
            merge_log,
        }
    }

    /// Returns the execution rollup.
    pub async fn execution_summary(&self, query: AuditLogQuery) -> AppResult<ExecutionSummary> {
        let entries = self.execution_log.list_executions(query).await?;
        Ok(summarize_executions(&entries))
    }

    /// Returns per-policy rollups, most bytes saved first.
    pub async fn policy_effectiveness(
        &self,
        query: AuditLogQuery,
    ) -> AppResult<Vec<PolicyEffectiveness>> {
        let entries = self.execution_log.list_executions(query).await?;
        Ok(policy_effectiveness(&entries))
    }

    /// Returns the merge rollup.
    pub async fn merge_summary(&self, query: AuditLogQuery) -> AppResult<MergeSummary> {
        let records = self.merge_log.list_merges(query).await?;
        Ok(summarize_merges(&records))
    }

    /// Lists raw execution rows.
    pub async fn list_executions(&self, query: AuditLogQuery) -> AppResult<Vec<ExecutionLogEntry>> {
        self.execution_log.list_executions(query).await
    }

    /// Lists raw merge rows.
    pub async fn list_merges(&self, query: AuditLogQuery) -> AppResult<Vec<PartitionMergeRecord>> {
        self.merge_log.list_merges(query).await
    }
}
