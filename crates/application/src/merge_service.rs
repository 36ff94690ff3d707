use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use strata_core::AppResult;
use strata_domain::{FinePartitionName, LifecycleSettings, PartitionKey, PartitionSnapshot};
use tracing::{info, warn};

use crate::lifecycle_ports::{
    AccessRecordRepository, EvaluationQueueRepository, MergeDestination, MergeLogRepository,
    MergeStatus, PartitionCatalog, PartitionLockCoordinator, PartitionMergeRecord,
    SettingsRepository, object_lock_key,
};

/// Folds aged fine-grained partitions into their coarse siblings.
///
/// Every call writes exactly one merge record.
#[derive(Clone)]
pub struct MergeService {
    catalog: Arc<dyn PartitionCatalog>,
    access_records: Arc<dyn AccessRecordRepository>,
    queue: Arc<dyn EvaluationQueueRepository>,
    merge_log: Arc<dyn MergeLogRepository>,
    settings: Arc<dyn SettingsRepository>,
    locks: Arc<dyn PartitionLockCoordinator>,
    holder_id: String,
}

enum MergePlan {
    Skip {
        target: Option<String>,
        reason: String,
    },
    Merge {
        destination: MergeDestination,
    },
}

impl MergeService {
    /// Creates a merge service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PartitionCatalog>,
        access_records: Arc<dyn AccessRecordRepository>,
        queue: Arc<dyn EvaluationQueueRepository>,
        merge_log: Arc<dyn MergeLogRepository>,
        settings: Arc<dyn SettingsRepository>,
        locks: Arc<dyn PartitionLockCoordinator>,
    ) -> Self {
        Self {
            catalog,
            access_records,
            queue,
            merge_log,
            settings,
            locks,
            holder_id: "merge".to_owned(),
        }
    }

    /// Sets the lock holder identity.
    #[must_use]
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    /// Merges one fine partition using a freshly loaded settings snapshot.
    pub async fn merge_into_coarser(&self, key: &PartitionKey) -> AppResult<PartitionMergeRecord> {
        let settings = self.settings.load_settings().await?;
        self.merge_with_settings(key, &settings).await
    }

    /// Merges one fine partition under an existing settings snapshot.
    pub async fn merge_with_settings(
        &self,
        key: &PartitionKey,
        settings: &LifecycleSettings,
    ) -> AppResult<PartitionMergeRecord> {
        let started = Instant::now();
        let attempted_at = Utc::now();
        let mut record = PartitionMergeRecord {
            object: key.object().clone(),
            source_partition: key.partition().to_owned(),
            target_partition: None,
            status: MergeStatus::Skipped,
            reason: None,
            duration_ms: 0,
            rows_merged: 0,
            attempted_at,
        };

        let Some(fine_name) = FinePartitionName::parse(key.partition()) else {
            record.reason = Some("partition name does not match a fine-grained pattern".to_owned());
            return self.finish(record, started).await;
        };
        record.target_partition = Some(fine_name.coarse_name().to_owned());

        if !settings.auto_merge() {
            record.reason = Some("auto-merge is disabled".to_owned());
            return self.finish(record, started).await;
        }

        let scope_key = object_lock_key(key.object());
        let lease = match self
            .locks
            .acquire(
                scope_key.as_str(),
                self.holder_id.as_str(),
                settings.lock_lease_seconds(),
                settings.lock_timeout(),
            )
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                record.status = MergeStatus::Failed;
                record.reason = Some(format!(
                    "lock_timeout: object lock not obtained within {}s",
                    settings.lock_timeout_seconds()
                ));
                return self.finish(record, started).await;
            }
            Err(error) => {
                record.status = MergeStatus::Failed;
                record.reason = Some(format!("{}: {error}", error.kind()));
                return self.finish(record, started).await;
            }
        };

        self.merge_locked(key, &fine_name, &mut record).await;

        if let Err(error) = self.locks.release(&lease).await {
            warn!(object = %key.object(), error = %error, "failed to release object lock");
        }

        self.finish(record, started).await
    }

    async fn merge_locked(
        &self,
        key: &PartitionKey,
        fine_name: &FinePartitionName,
        record: &mut PartitionMergeRecord,
    ) {
        let partitions = match self.catalog.list_partitions(key.object()).await {
            Ok(partitions) => partitions,
            Err(error) => {
                record.status = MergeStatus::Failed;
                record.reason = Some(format!("{}: {error}", error.kind()));
                return;
            }
        };

        let destination = match plan_merge(key.partition(), fine_name, &partitions) {
            MergePlan::Skip { target, reason } => {
                record.target_partition = target;
                record.reason = Some(reason);
                return;
            }
            MergePlan::Merge { destination } => destination,
        };
        record.target_partition = Some(destination.name().to_owned());

        match self.catalog.merge_partition(key, &destination).await {
            Ok(rows_merged) => {
                record.status = MergeStatus::Success;
                record.rows_merged = rows_merged;
                self.forget_source(key).await;
            }
            Err(error) => {
                record.status = MergeStatus::Failed;
                record.reason = Some(format!("{}: {error}", error.kind()));
            }
        }
    }

    async fn forget_source(&self, key: &PartitionKey) {
        if let Err(error) = self.access_records.delete_record(key).await {
            warn!(partition = %key, error = %error, "failed to remove merged access record");
        }
        if let Err(error) = self.queue.delete_partition_entries(key).await {
            warn!(partition = %key, error = %error, "failed to remove merged queue entries");
        }
    }

    async fn finish(
        &self,
        mut record: PartitionMergeRecord,
        started: Instant,
    ) -> AppResult<PartitionMergeRecord> {
        record.duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.merge_log.append_merge(record.clone()).await?;

        info!(
            object = %record.object,
            source = %record.source_partition,
            target = record.target_partition.as_deref().unwrap_or("-"),
            status = record.status.as_str(),
            rows_merged = record.rows_merged,
            reason = record.reason.as_deref().unwrap_or(""),
            "partition merge attempted"
        );

        Ok(record)
    }
}

fn plan_merge(
    source_name: &str,
    fine_name: &FinePartitionName,
    partitions: &[PartitionSnapshot],
) -> MergePlan {
    let coarse_name = fine_name.coarse_name();
    let Some(source) = partitions
        .iter()
        .find(|partition| partition.name.eq_ignore_ascii_case(source_name))
    else {
        return MergePlan::Skip {
            target: Some(coarse_name.to_owned()),
            reason: "source partition no longer exists".to_owned(),
        };
    };

    let destination = partitions
        .iter()
        .find(|partition| partition.name.eq_ignore_ascii_case(coarse_name));

    match destination {
        Some(destination) => {
            let adjacent =
                source.lower_bound.is_some() && destination.upper_bound == source.lower_bound;
            if !adjacent {
                return MergePlan::Skip {
                    target: Some(destination.name.clone()),
                    reason: format!(
                        "destination '{}' is not adjacent to the source",
                        destination.name
                    ),
                };
            }

            if !destination.location.eq_ignore_ascii_case(source.location.as_str())
                || destination.codec != source.codec
            {
                return MergePlan::Skip {
                    target: Some(destination.name.clone()),
                    reason: format!(
                        "location/codec mismatch: source {}/{} vs destination {}/{}",
                        source.location, source.codec, destination.location, destination.codec
                    ),
                };
            }

            MergePlan::Merge {
                destination: MergeDestination::Existing {
                    name: destination.name.clone(),
                },
            }
        }
        None => {
            let lower_sibling = partitions.iter().find(|partition| {
                !partition.name.eq_ignore_ascii_case(source_name)
                    && FinePartitionName::parse(partition.name.as_str())
                        .is_some_and(|sibling| sibling.coarse_name() == coarse_name)
                    && partition.upper_bound.is_some()
                    && partition.upper_bound <= source.lower_bound
            });

            if let Some(sibling) = lower_sibling {
                return MergePlan::Skip {
                    target: Some(coarse_name.to_owned()),
                    reason: format!(
                        "fine sibling '{}' of the same period lies below the source",
                        sibling.name
                    ),
                };
            }

            MergePlan::Merge {
                destination: MergeDestination::Rename {
                    name: coarse_name.to_owned(),
                },
            }
        }
    }
}
