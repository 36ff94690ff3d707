use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_application::{PolicyWriteResult, TemplateSource};
use strata_core::AppError;
use strata_domain::{Policy, PolicyAdvisory, PolicyId, PolicyInput};

/// Incoming payload for enabling or disabling a policy.
#[derive(Debug, Deserialize)]
pub struct SetPolicyEnabledRequest {
    pub enabled: bool,
}

/// Incoming payload for threshold profile create/replace.
#[derive(Debug, Deserialize)]
pub struct SaveThresholdProfileRequest {
    pub hot_days: u32,
    pub warm_days: u32,
    pub cold_days: u32,
    pub description: Option<String>,
}

/// Incoming payload for policy template create/replace.
#[derive(Debug, Deserialize)]
pub struct SavePolicyTemplateRequest {
    pub description: Option<String>,
    pub document: Value,
}

/// Incoming payload for template application.
///
/// Exactly one of `template_name` and `document` must be set.
#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub template_name: Option<String>,
    pub document: Option<Value>,
    pub owner: String,
    pub object: String,
}

impl ApplyTemplateRequest {
    /// Splits the payload into the template source and the target object.
    pub fn into_parts(self) -> Result<(TemplateSource, String, String), AppError> {
        let source = match (self.template_name, self.document) {
            (Some(name), None) => TemplateSource::Named(name),
            (None, Some(document)) => TemplateSource::Document(document),
            _ => {
                return Err(AppError::Validation(
                    "exactly one of template_name and document is required".to_owned(),
                ));
            }
        };

        Ok((source, self.owner, self.object))
    }
}

/// API representation of one policy.
#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub id: PolicyId,
    #[serde(flatten)]
    pub definition: PolicyInput,
}

/// API representation of an accepted policy write.
#[derive(Debug, Serialize)]
pub struct PolicyWriteResponse {
    pub policy: PolicyResponse,
    pub advisories: Vec<AdvisoryResponse>,
}

/// API representation of one policy advisory.
#[derive(Debug, Serialize)]
pub struct AdvisoryResponse {
    pub code: PolicyAdvisory,
    pub message: &'static str,
}

impl From<Policy> for PolicyResponse {
    fn from(value: Policy) -> Self {
        Self {
            id: value.id(),
            definition: value.to_input(),
        }
    }
}

impl From<PolicyWriteResult> for PolicyWriteResponse {
    fn from(value: PolicyWriteResult) -> Self {
        Self {
            policy: PolicyResponse::from(value.policy),
            advisories: value
                .advisories
                .into_iter()
                .map(|advisory| AdvisoryResponse {
                    code: advisory,
                    message: advisory.message(),
                })
                .collect(),
        }
    }
}
