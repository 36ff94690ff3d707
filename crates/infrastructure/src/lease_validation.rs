use std::time::Duration;

use strata_core::{AppError, AppResult};

/// Interval between acquisition attempts while waiting for a held lease.
pub(crate) const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) fn validate_lease_request(
    scope_key: &str,
    holder_id: &str,
    lease_seconds: u32,
) -> AppResult<()> {
    if scope_key.trim().is_empty() {
        return Err(AppError::Validation(
            "partition lock scope_key must not be empty".to_owned(),
        ));
    }

    if holder_id.trim().is_empty() {
        return Err(AppError::Validation(
            "partition lock holder_id must not be empty".to_owned(),
        ));
    }

    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "partition lock lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

pub(crate) fn lease_token(holder_id: &str) -> String {
    format!("{holder_id}:{}", uuid::Uuid::new_v4())
}
