use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use strata_application::PolicyRepository;
use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, ConditionExpr, Policy, PolicyId, PolicyInput, PolicyTemplate, PolicyType,
    Temperature, ThresholdProfile,
};
use uuid::Uuid;

mod profiles;
mod templates;

/// PostgreSQL-backed repository for policies, threshold profiles and templates.
#[derive(Clone)]
pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    /// Creates a policy repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: Uuid,
    name: String,
    owner: String,
    object_name: String,
    policy_type: String,
    action_type: String,
    age_days: Option<i64>,
    age_months: Option<i64>,
    access_pattern: Option<String>,
    size_threshold_mb: Option<i64>,
    custom_condition: Option<Value>,
    compression_type: Option<String>,
    target_location: Option<String>,
    priority: i32,
    enabled: bool,
    threshold_profile: Option<String>,
}

#[derive(Debug, FromRow)]
struct ThresholdProfileRow {
    name: String,
    hot_days: i32,
    warm_days: i32,
    cold_days: i32,
    description: Option<String>,
}

#[derive(Debug, FromRow)]
struct PolicyTemplateRow {
    name: String,
    description: Option<String>,
    document: Value,
}

const POLICY_COLUMNS: &str = r#"
    id,
    name,
    owner,
    object_name,
    policy_type,
    action_type,
    age_days,
    age_months,
    access_pattern,
    size_threshold_mb,
    custom_condition,
    compression_type,
    target_location,
    priority,
    enabled,
    threshold_profile
"#;

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn create_policy(&self, policy: Policy) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start policy transaction: {error}"))
        })?;
        insert_policy(&mut transaction, &policy).await?;
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit policy transaction: {error}"))
        })
    }

    async fn create_policies(&self, policies: Vec<Policy>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start policy batch transaction: {error}"))
        })?;

        for policy in &policies {
            insert_policy(&mut transaction, policy).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit policy batch transaction: {error}"))
        })
    }

    async fn update_policy(&self, policy: Policy) -> AppResult<()> {
        let input = policy.to_input();
        let custom_condition = condition_to_json(input.custom_condition.as_ref())?;

        let result = sqlx::query(
            r#"
            UPDATE ilm_policies
            SET name = $2,
                owner = $3,
                object_name = $4,
                policy_type = $5,
                action_type = $6,
                age_days = $7,
                age_months = $8,
                access_pattern = $9,
                size_threshold_mb = $10,
                custom_condition = $11,
                compression_type = $12,
                target_location = $13,
                priority = $14,
                enabled = $15,
                threshold_profile = $16,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(policy.id().as_uuid())
        .bind(input.name.as_str())
        .bind(input.owner.as_str())
        .bind(input.object.as_str())
        .bind(input.policy_type.as_str())
        .bind(input.action_type.as_str())
        .bind(input.age_days)
        .bind(input.age_months)
        .bind(input.access_pattern.map(|pattern| pattern.as_str()))
        .bind(input.size_threshold_mb)
        .bind(custom_condition)
        .bind(input.compression_type.as_deref())
        .bind(input.target_location.as_deref())
        .bind(i32::from(policy.priority()))
        .bind(input.enabled)
        .bind(input.threshold_profile.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| policy_write_error(error, input.name.as_str()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "policy '{}' does not exist",
                policy.id()
            )));
        }

        Ok(())
    }

    async fn delete_policy(&self, policy_id: PolicyId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ilm_policies WHERE id = $1")
            .bind(policy_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete policy: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "policy '{policy_id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<Option<Policy>> {
        let row = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM ilm_policies WHERE id = $1"
        ))
        .bind(policy_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find policy: {error}")))?;

        row.map(policy_from_row).transpose()
    }

    async fn find_policy_by_name(&self, name: &str) -> AppResult<Option<Policy>> {
        let row = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM ilm_policies WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find policy by name: {error}")))?;

        row.map(policy_from_row).transpose()
    }

    async fn list_policies(&self) -> AppResult<Vec<Policy>> {
        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM ilm_policies ORDER BY priority, name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list policies: {error}")))?;

        rows.into_iter().map(policy_from_row).collect()
    }

    async fn list_enabled_policies(&self) -> AppResult<Vec<Policy>> {
        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM ilm_policies WHERE enabled ORDER BY priority, name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list enabled policies: {error}"))
        })?;

        rows.into_iter().map(policy_from_row).collect()
    }

    async fn save_profile(&self, profile: ThresholdProfile) -> AppResult<()> {
        self.save_profile_impl(profile).await
    }

    async fn find_profile(&self, name: &str) -> AppResult<Option<ThresholdProfile>> {
        self.find_profile_impl(name).await
    }

    async fn list_profiles(&self) -> AppResult<Vec<ThresholdProfile>> {
        self.list_profiles_impl().await
    }

    async fn delete_profile(&self, name: &str) -> AppResult<()> {
        self.delete_profile_impl(name).await
    }

    async fn save_template(&self, template: PolicyTemplate) -> AppResult<()> {
        self.save_template_impl(template).await
    }

    async fn find_template(&self, name: &str) -> AppResult<Option<PolicyTemplate>> {
        self.find_template_impl(name).await
    }

    async fn list_templates(&self) -> AppResult<Vec<PolicyTemplate>> {
        self.list_templates_impl().await
    }

    async fn delete_template(&self, name: &str) -> AppResult<()> {
        self.delete_template_impl(name).await
    }
}

async fn insert_policy(
    transaction: &mut Transaction<'_, Postgres>,
    policy: &Policy,
) -> AppResult<()> {
    let input = policy.to_input();
    let custom_condition = condition_to_json(input.custom_condition.as_ref())?;

    sqlx::query(
        r#"
        INSERT INTO ilm_policies (
            id,
            name,
            owner,
            object_name,
            policy_type,
            action_type,
            age_days,
            age_months,
            access_pattern,
            size_threshold_mb,
            custom_condition,
            compression_type,
            target_location,
            priority,
            enabled,
            threshold_profile
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(policy.id().as_uuid())
    .bind(input.name.as_str())
    .bind(input.owner.as_str())
    .bind(input.object.as_str())
    .bind(input.policy_type.as_str())
    .bind(input.action_type.as_str())
    .bind(input.age_days)
    .bind(input.age_months)
    .bind(input.access_pattern.map(|pattern| pattern.as_str()))
    .bind(input.size_threshold_mb)
    .bind(custom_condition)
    .bind(input.compression_type.as_deref())
    .bind(input.target_location.as_deref())
    .bind(i32::from(policy.priority()))
    .bind(input.enabled)
    .bind(input.threshold_profile.as_deref())
    .execute(&mut **transaction)
    .await
    .map_err(|error| policy_write_error(error, input.name.as_str()))?;

    Ok(())
}

fn policy_write_error(error: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!("policy '{name}' already exists"));
            }
            Some("23503") => {
                return AppError::Validation(format!(
                    "threshold_profile_not_found: policy '{name}' references an unknown profile"
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to save policy '{name}': {error}"))
}

fn condition_to_json(condition: Option<&ConditionExpr>) -> AppResult<Option<Value>> {
    condition
        .map(|condition| {
            serde_json::to_value(condition).map_err(|error| {
                AppError::Internal(format!("failed to serialize custom condition: {error}"))
            })
        })
        .transpose()
}

fn policy_from_row(row: PolicyRow) -> AppResult<Policy> {
    let custom_condition = row
        .custom_condition
        .map(|value| {
            serde_json::from_value::<ConditionExpr>(value).map_err(|error| {
                AppError::Internal(format!(
                    "stored custom condition of policy '{}' is invalid: {error}",
                    row.name
                ))
            })
        })
        .transpose()?;
    let access_pattern = row
        .access_pattern
        .as_deref()
        .map(str::parse::<Temperature>)
        .transpose()?;

    let input = PolicyInput {
        name: row.name,
        owner: row.owner,
        object: row.object_name,
        policy_type: row.policy_type.parse::<PolicyType>()?,
        action_type: row.action_type.parse::<ActionType>()?,
        age_days: row.age_days,
        age_months: row.age_months,
        access_pattern,
        size_threshold_mb: row.size_threshold_mb,
        custom_condition,
        compression_type: row.compression_type,
        target_location: row.target_location,
        priority: i64::from(row.priority),
        enabled: row.enabled,
        threshold_profile: row.threshold_profile,
    };

    Policy::new(PolicyId::from_uuid(row.id), input).map_err(|error| {
        AppError::Internal(format!("stored policy is invalid: {error}"))
    })
}

fn profile_from_row(row: ThresholdProfileRow) -> AppResult<ThresholdProfile> {
    ThresholdProfile::new(
        row.name,
        day_count(row.hot_days)?,
        day_count(row.warm_days)?,
        day_count(row.cold_days)?,
        row.description,
    )
}

fn template_from_row(row: PolicyTemplateRow) -> AppResult<PolicyTemplate> {
    PolicyTemplate::new(row.name, row.description, row.document)
}

fn day_count(value: i32) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored threshold '{value}' is negative")))
}

#[cfg(test)]
mod tests;
