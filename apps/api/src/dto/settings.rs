use serde::{Deserialize, Serialize};
use strata_core::AppError;
use strata_domain::{LifecycleSettings, Thresholds};

/// Transport shape of the lifecycle settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LifecycleSettingsDto {
    pub hot_days: u32,
    pub warm_days: u32,
    pub cold_days: u32,
    pub frozen_split: bool,
    pub auto_merge: bool,
    pub lock_timeout_seconds: u32,
    pub lock_lease_seconds: u32,
    pub emergency_stop: bool,
}

/// Incoming payload for toggling the emergency stop.
#[derive(Debug, Deserialize)]
pub struct EmergencyStopRequest {
    pub stopped: bool,
}

impl From<LifecycleSettings> for LifecycleSettingsDto {
    fn from(value: LifecycleSettings) -> Self {
        let thresholds = value.thresholds();
        Self {
            hot_days: thresholds.hot_days(),
            warm_days: thresholds.warm_days(),
            cold_days: thresholds.cold_days(),
            frozen_split: value.frozen_split(),
            auto_merge: value.auto_merge(),
            lock_timeout_seconds: value.lock_timeout_seconds(),
            lock_lease_seconds: value.lock_lease_seconds(),
            emergency_stop: value.emergency_stop(),
        }
    }
}

impl TryFrom<LifecycleSettingsDto> for LifecycleSettings {
    type Error = AppError;

    fn try_from(value: LifecycleSettingsDto) -> Result<Self, Self::Error> {
        Self::new(
            Thresholds::new(value.hot_days, value.warm_days, value.cold_days)?,
            value.frozen_split,
            value.auto_merge,
            value.lock_timeout_seconds,
            value.lock_lease_seconds,
            value.emergency_stop,
        )
    }
}
