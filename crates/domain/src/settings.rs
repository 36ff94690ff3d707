use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult};

use crate::tier::Thresholds;

/// Process-wide lifecycle configuration, loaded once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    thresholds: Thresholds,
    frozen_split: bool,
    auto_merge: bool,
    lock_timeout_seconds: u32,
    lock_lease_seconds: u32,
    emergency_stop: bool,
}

impl LifecycleSettings {
    /// Creates a validated settings snapshot.
    pub fn new(
        thresholds: Thresholds,
        frozen_split: bool,
        auto_merge: bool,
        lock_timeout_seconds: u32,
        lock_lease_seconds: u32,
        emergency_stop: bool,
    ) -> AppResult<Self> {
        if lock_lease_seconds == 0 {
            return Err(AppError::Validation(
                "lock lease must be at least one second".to_owned(),
            ));
        }

        if lock_lease_seconds < lock_timeout_seconds {
            return Err(AppError::Validation(format!(
                "lock lease ({lock_lease_seconds}s) must not be shorter than the lock timeout ({lock_timeout_seconds}s)"
            )));
        }

        Ok(Self {
            thresholds,
            frozen_split,
            auto_merge,
            lock_timeout_seconds,
            lock_lease_seconds,
            emergency_stop,
        })
    }

    /// Returns default thresholds.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Returns whether ages past the COLD cutoff classify as FROZEN.
    #[must_use]
    pub fn frozen_split(&self) -> bool {
        self.frozen_split
    }

    /// Returns whether successful relocations trigger consolidation.
    #[must_use]
    pub fn auto_merge(&self) -> bool {
        self.auto_merge
    }

    /// Returns the maximum wait for a lock.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.lock_timeout_seconds))
    }

    /// Returns the lease length of acquired locks.
    #[must_use]
    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(u64::from(self.lock_lease_seconds))
    }

    /// Returns the lock wait in seconds.
    #[must_use]
    pub fn lock_timeout_seconds(&self) -> u32 {
        self.lock_timeout_seconds
    }

    /// Returns the lock lease in seconds.
    #[must_use]
    pub fn lock_lease_seconds(&self) -> u32 {
        self.lock_lease_seconds
    }

    /// Returns whether execution is halted.
    #[must_use]
    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    /// Returns a copy with the emergency stop flag changed.
    #[must_use]
    pub fn with_emergency_stop(mut self, emergency_stop: bool) -> Self {
        self.emergency_stop = emergency_stop;
        self
    }

    /// Returns a copy with auto-merge changed.
    #[must_use]
    pub fn with_auto_merge(mut self, auto_merge: bool) -> Self {
        self.auto_merge = auto_merge;
        self
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            frozen_split: false,
            auto_merge: true,
            lock_timeout_seconds: 30,
            lock_lease_seconds: 300,
            emergency_stop: false,
        }
    }
}
