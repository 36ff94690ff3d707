use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use strata_core::{AppError, AppResult};
use strata_domain::{LifecycleSettings, ObjectRef, PartitionAccessRecord};
use tracing::{info, warn};

use crate::lifecycle_ports::{
    AccessRecordRepository, PartitionCatalog, PartitionLockCoordinator, PolicyRepository,
    SettingsRepository, refresh_lock_key,
};

/// Counters of one refresh call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Objects refreshed.
    pub objects: u32,
    /// Access records written.
    pub refreshed: u32,
    /// Partitions or objects skipped after an error.
    pub skipped: u32,
}

impl RefreshSummary {
    fn absorb(&mut self, other: Self) {
        self.objects += other.objects;
        self.refreshed += other.refreshed;
        self.skipped += other.skipped;
    }
}

/// Maintains per-partition access and temperature records.
#[derive(Clone)]
pub struct TrackingService {
    catalog: Arc<dyn PartitionCatalog>,
    access_records: Arc<dyn AccessRecordRepository>,
    policies: Arc<dyn PolicyRepository>,
    settings: Arc<dyn SettingsRepository>,
    locks: Arc<dyn PartitionLockCoordinator>,
    holder_id: String,
}

impl TrackingService {
    /// Creates a tracking service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PartitionCatalog>,
        access_records: Arc<dyn AccessRecordRepository>,
        policies: Arc<dyn PolicyRepository>,
        settings: Arc<dyn SettingsRepository>,
        locks: Arc<dyn PartitionLockCoordinator>,
    ) -> Self {
        Self {
            catalog,
            access_records,
            policies,
            settings,
            locks,
            holder_id: "tracking".to_owned(),
        }
    }

    /// Sets the lease holder identity.
    #[must_use]
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    /// Recomputes access records for every partition of one object.
    ///
    /// Fails fast with a lock timeout when another refresh of the same object
    /// is in progress.
    pub async fn refresh(&self, object: &ObjectRef) -> AppResult<RefreshSummary> {
        let settings = self.settings.load_settings().await?;
        self.refresh_with_settings(object, &settings).await
    }

    /// Refreshes every object targeted by an enabled policy.
    pub async fn refresh_all(&self) -> AppResult<RefreshSummary> {
        let settings = self.settings.load_settings().await?;
        let objects: BTreeSet<ObjectRef> = self
            .policies
            .list_enabled_policies()
            .await?
            .into_iter()
            .map(|policy| policy.target().clone())
            .collect();

        let mut summary = RefreshSummary::default();
        for object in objects {
            match self.refresh_with_settings(&object, &settings).await {
                Ok(object_summary) => summary.absorb(object_summary),
                Err(error) => {
                    summary.skipped += 1;
                    warn!(object = %object, error = %error, "access refresh skipped object");
                }
            }
        }

        info!(
            objects = summary.objects,
            refreshed = summary.refreshed,
            skipped = summary.skipped,
            "access refresh completed"
        );

        Ok(summary)
    }

    async fn refresh_with_settings(
        &self,
        object: &ObjectRef,
        settings: &LifecycleSettings,
    ) -> AppResult<RefreshSummary> {
        let scope_key = refresh_lock_key(object);
        let lease = self
            .locks
            .acquire(
                scope_key.as_str(),
                self.holder_id.as_str(),
                settings.lock_lease_seconds(),
                Duration::ZERO,
            )
            .await?
            .ok_or_else(|| {
                AppError::LockTimeout(format!("access refresh of '{object}' is already running"))
            })?;

        let result = self.refresh_locked(object, settings).await;

        if let Err(error) = self.locks.release(&lease).await {
            warn!(object = %object, error = %error, "failed to release refresh lease");
        }

        result
    }

    async fn refresh_locked(
        &self,
        object: &ObjectRef,
        settings: &LifecycleSettings,
    ) -> AppResult<RefreshSummary> {
        let descriptor = self
            .catalog
            .find_object(object)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("object '{object}' does not exist")))?;
        if !descriptor.partitioned {
            return Err(AppError::Validation(format!(
                "object '{object}' is not partitioned"
            )));
        }

        let now = Utc::now();
        let mut summary = RefreshSummary {
            objects: 1,
            ..RefreshSummary::default()
        };

        for snapshot in self.catalog.list_partitions(object).await? {
            let result = async {
                let key = object.partition(snapshot.name.as_str())?;
                let previous = self.access_records.find_record(&key).await?;
                let record = PartitionAccessRecord::observe(
                    key,
                    &snapshot,
                    previous.as_ref(),
                    settings.thresholds(),
                    settings.frozen_split(),
                    now,
                )?;
                self.access_records.upsert_record(record).await
            }
            .await;

            match result {
                Ok(()) => summary.refreshed += 1,
                Err(error) => {
                    summary.skipped += 1;
                    warn!(
                        object = %object,
                        partition = %snapshot.name,
                        error = %error,
                        "access refresh skipped partition"
                    );
                }
            }
        }

        Ok(summary)
    }
}
