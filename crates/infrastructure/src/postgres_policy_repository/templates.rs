use super::*;

impl PostgresPolicyRepository {
    pub(super) async fn save_template_impl(&self, template: PolicyTemplate) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ilm_policy_templates (name, description, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description,
                document = EXCLUDED.document,
                updated_at = now()
            "#,
        )
        .bind(template.name().as_str())
        .bind(template.description())
        .bind(template.document())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save policy template '{}': {error}",
                template.name().as_str()
            ))
        })?;

        Ok(())
    }

    pub(super) async fn find_template_impl(&self, name: &str) -> AppResult<Option<PolicyTemplate>> {
        let row = sqlx::query_as::<_, PolicyTemplateRow>(
            "SELECT name, description, document FROM ilm_policy_templates WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find policy template: {error}")))?;

        row.map(template_from_row).transpose()
    }

    pub(super) async fn list_templates_impl(&self) -> AppResult<Vec<PolicyTemplate>> {
        let rows = sqlx::query_as::<_, PolicyTemplateRow>(
            "SELECT name, description, document FROM ilm_policy_templates ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list policy templates: {error}"))
        })?;

        rows.into_iter().map(template_from_row).collect()
    }

    pub(super) async fn delete_template_impl(&self, name: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ilm_policy_templates WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete policy template: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "policy template '{name}' does not exist"
            )));
        }

        Ok(())
    }
}
