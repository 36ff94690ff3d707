use super::*;

impl PostgresPolicyRepository {
    pub(super) async fn save_profile_impl(&self, profile: ThresholdProfile) -> AppResult<()> {
        let thresholds = profile.thresholds();

        sqlx::query(
            r#"
            INSERT INTO ilm_threshold_profiles (name, hot_days, warm_days, cold_days, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET hot_days = EXCLUDED.hot_days,
                warm_days = EXCLUDED.warm_days,
                cold_days = EXCLUDED.cold_days,
                description = EXCLUDED.description,
                updated_at = now()
            "#,
        )
        .bind(profile.name().as_str())
        .bind(stored_days(thresholds.hot_days())?)
        .bind(stored_days(thresholds.warm_days())?)
        .bind(stored_days(thresholds.cold_days())?)
        .bind(profile.description())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save threshold profile '{}': {error}",
                profile.name().as_str()
            ))
        })?;

        Ok(())
    }

    pub(super) async fn find_profile_impl(&self, name: &str) -> AppResult<Option<ThresholdProfile>> {
        let row = sqlx::query_as::<_, ThresholdProfileRow>(
            r#"
            SELECT name, hot_days, warm_days, cold_days, description
            FROM ilm_threshold_profiles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find threshold profile: {error}"))
        })?;

        row.map(profile_from_row).transpose()
    }

    pub(super) async fn list_profiles_impl(&self) -> AppResult<Vec<ThresholdProfile>> {
        let rows = sqlx::query_as::<_, ThresholdProfileRow>(
            r#"
            SELECT name, hot_days, warm_days, cold_days, description
            FROM ilm_threshold_profiles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list threshold profiles: {error}"))
        })?;

        rows.into_iter().map(profile_from_row).collect()
    }

    pub(super) async fn delete_profile_impl(&self, name: &str) -> AppResult<()> {
        let referencing: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM ilm_policies
            WHERE threshold_profile = $1
            ORDER BY name
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check threshold profile references: {error}"))
        })?;

        if !referencing.is_empty() {
            return Err(AppError::Conflict(format!(
                "threshold profile '{name}' is referenced by policies: {}",
                referencing.join(", ")
            )));
        }

        let result = sqlx::query("DELETE FROM ilm_threshold_profiles WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23503")
                {
                    return AppError::Conflict(format!(
                        "threshold profile '{name}' is referenced by a policy"
                    ));
                }

                AppError::Internal(format!("failed to delete threshold profile: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "threshold profile '{name}' does not exist"
            )));
        }

        Ok(())
    }
}

fn stored_days(value: u32) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::Validation(format!("threshold '{value}' is out of range")))
}
