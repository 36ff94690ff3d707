mod common;
mod lifecycle;
mod policies;
mod reports;
mod settings;

pub use common::{HealthDependencyStatus, HealthResponse};
pub use lifecycle::{
    BoundaryPreviewRequest, EvaluateRequest, ExecuteRequest, MergeRequest, QueueListQuery,
    RefreshRequest, RunCycleRequest,
};
pub use policies::{
    ApplyTemplateRequest, PolicyResponse, PolicyWriteResponse, SavePolicyTemplateRequest,
    SaveThresholdProfileRequest, SetPolicyEnabledRequest,
};
pub use reports::{AuditQueryParams, LifecycleReportResponse};
pub use settings::{EmergencyStopRequest, LifecycleSettingsDto};
