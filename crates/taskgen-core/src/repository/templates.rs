use crate::error::CoreError;
use crate::models::{Cadence, NewTemplateData, RecurrenceRule};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{Utc, Weekday};
use uuid::Uuid;

#[async_trait]
impl super::TemplateRepository for SqliteRepository {
    async fn add_template(&self, data: NewTemplateData) -> Result<RecurrenceRule, CoreError> {
        let weekly_days = validate_template(&data)?;

        let rule = RecurrenceRule {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            cadence: data.cadence,
            weekly_days,
            start_date: data.start_date,
            end_date: data.end_date,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };

        sqlx::query(
            r#"INSERT INTO task_templates (id, owner_id, project_id, title, description, cadence, weekly_days, start_date, end_date, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(rule.id)
        .bind(rule.owner_id)
        .bind(rule.project_id)
        .bind(&rule.title)
        .bind(&rule.description)
        .bind(&rule.cadence)
        .bind(&rule.weekly_days)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .bind(rule.deleted_at)
        .execute(self.pool())
        .await?;

        Ok(rule)
    }

    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM task_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    async fn list_templates(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as(
            r#"SELECT * FROM task_templates
            WHERE deleted_at IS NULL
            ORDER BY id
            LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;
        Ok(rules)
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE task_templates SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Template with id {} not found",
                id
            )));
        }
        Ok(())
    }
}

/// Creation-time defense against malformed rules: a weekly template must name
/// at least one valid weekday, other cadences must name none, and the date
/// bounds must be ordered. Returns the normalized weekday string to store.
fn validate_template(data: &NewTemplateData) -> Result<Option<String>, CoreError> {
    if let Some(end) = data.end_date {
        if data.start_date > end {
            return Err(CoreError::InvalidInput(format!(
                "start_date {} is after end_date {}",
                data.start_date, end
            )));
        }
    }

    match data.cadence {
        Cadence::Weekly => {
            let named: Vec<&str> = data
                .weekly_days
                .iter()
                .map(|d| d.trim())
                .filter(|d| !d.is_empty())
                .collect();
            if named.is_empty() {
                return Err(CoreError::InvalidInput(
                    "a weekly template requires at least one weekday".to_string(),
                ));
            }
            for day in &named {
                day.parse::<Weekday>().map_err(|_| {
                    CoreError::InvalidInput(format!("unrecognized weekday '{}'", day))
                })?;
            }
            Ok(Some(named.join(",")))
        }
        Cadence::Daily | Cadence::Monthly => {
            if data.weekly_days.iter().any(|d| !d.trim().is_empty()) {
                return Err(CoreError::InvalidInput(
                    "weekday selections are only valid for weekly templates".to_string(),
                ));
            }
            Ok(None)
        }
    }
}
