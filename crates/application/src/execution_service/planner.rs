use std::collections::HashSet;

use strata_domain::PartitionAccessRecord;

use super::*;

/// One action an execution run will attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAction {
    /// Queue entry driving the action.
    pub entry: EvaluationQueueEntry,
    /// Tracked segment size before the action.
    pub size_before_bytes: Option<i64>,
    /// Nominal size after the action, from codec ratios.
    pub estimated_size_after_bytes: Option<i64>,
}

impl ExecutionService {
    /// Computes the ordered plan shared by simulated and real runs.
    ///
    /// Entries arrive in (priority, queued time) order; the first entry per
    /// partition wins and later ones stay queued.
    pub(super) async fn plan(
        &self,
        max_actions: usize,
        scope: &ExecutionScope,
    ) -> AppResult<(Vec<PlannedAction>, u32)> {
        let runnable = self.queue.list_runnable(scope).await?;

        let mut seen = HashSet::new();
        let mut planned = Vec::new();
        let mut duplicates = 0_u32;
        for entry in runnable {
            if !entry.is_runnable() || !scope.includes(&entry) {
                continue;
            }

            if !seen.insert(entry.key.clone()) {
                duplicates += 1;
                continue;
            }

            if planned.len() >= max_actions {
                continue;
            }

            let record = self.access_records.find_record(&entry.key).await?;
            let size_before_bytes = record.as_ref().map(|record| record.size_bytes);
            let estimated_size_after_bytes =
                record.as_ref().map(|record| estimate_size_after(record, &entry.target));

            planned.push(PlannedAction {
                entry,
                size_before_bytes,
                estimated_size_after_bytes,
            });
        }

        Ok((planned, duplicates))
    }
}

fn estimate_size_after(
    record: &PartitionAccessRecord,
    target: &TransitionTarget,
) -> i64 {
    match target {
        TransitionTarget::Drop | TransitionTarget::Truncate => 0,
        TransitionTarget::Compress { .. } | TransitionTarget::Move { .. } => {
            let codec = target.codec().unwrap_or(record.codec);
            let ratio = codec.nominal_ratio() / record.codec.nominal_ratio();
            (record.size_bytes as f64 / ratio).round() as i64
        }
    }
}
