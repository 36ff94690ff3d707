use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_application::{AuditLogQuery, ExecutionSummary, MergeSummary};
use strata_core::AppError;
use strata_domain::ObjectRef;

/// Query parameters shared by report and audit log endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    pub owner: Option<String>,
    pub object: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Combined execution and merge rollup.
#[derive(Debug, Serialize)]
pub struct LifecycleReportResponse {
    pub executions: ExecutionSummary,
    pub merges: MergeSummary,
}

impl TryFrom<AuditQueryParams> for AuditLogQuery {
    type Error = AppError;

    fn try_from(value: AuditQueryParams) -> Result<Self, Self::Error> {
        let object = match (value.owner, value.object) {
            (None, None) => None,
            (Some(owner), Some(object)) => Some(ObjectRef::new(owner, object)?),
            _ => {
                return Err(AppError::Validation(
                    "owner and object must be given together".to_owned(),
                ));
            }
        };

        Ok(Self {
            object,
            since: value.since,
            limit: value.limit,
        })
    }
}
