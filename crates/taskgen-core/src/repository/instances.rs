use crate::error::CoreError;
use crate::models::{NewOccurrenceData, OccurrencePriority, OccurrenceStatus, TaskOccurrence};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

#[async_trait]
impl super::InstanceRepository for SqliteRepository {
    async fn find_occurrence(
        &self,
        template_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, CoreError> {
        // Deliberately no deleted_at filter: soft-deleted rows keep their key
        let occurrence = sqlx::query_as(
            "SELECT * FROM task_instances WHERE template_id = $1 AND due_date = $2",
        )
        .bind(template_id)
        .bind(due_date)
        .fetch_optional(self.pool())
        .await?;
        Ok(occurrence)
    }

    async fn find_active_occurrence(
        &self,
        template_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, CoreError> {
        let occurrence = sqlx::query_as(
            r#"SELECT * FROM task_instances
            WHERE template_id = $1 AND due_date = $2 AND deleted_at IS NULL"#,
        )
        .bind(template_id)
        .bind(due_date)
        .fetch_optional(self.pool())
        .await?;
        Ok(occurrence)
    }

    async fn create_occurrence(
        &self,
        data: NewOccurrenceData,
    ) -> Result<TaskOccurrence, CoreError> {
        let occurrence = TaskOccurrence {
            id: Uuid::now_v7(),
            template_id: data.template_id,
            owner_id: data.owner_id,
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            priority: OccurrencePriority::Medium,
            status: OccurrenceStatus::Pending,
            due_date: data.due_date,
            due_at: data.due_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };

        let result = sqlx::query(
            r#"INSERT INTO task_instances (id, template_id, owner_id, project_id, title, description, priority, status, due_date, due_at, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(occurrence.id)
        .bind(occurrence.template_id)
        .bind(occurrence.owner_id)
        .bind(occurrence.project_id)
        .bind(&occurrence.title)
        .bind(&occurrence.description)
        .bind(&occurrence.priority)
        .bind(&occurrence.status)
        .bind(occurrence.due_date)
        .bind(occurrence.due_at)
        .bind(occurrence.created_at)
        .bind(occurrence.updated_at)
        .bind(occurrence.deleted_at)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(occurrence),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(CoreError::DuplicateOccurrence {
                    template_id: occurrence.template_id,
                    due_date: occurrence.due_date,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_occurrences_for_template(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<TaskOccurrence>, CoreError> {
        let occurrences = sqlx::query_as(
            r#"SELECT * FROM task_instances
            WHERE template_id = $1 AND deleted_at IS NULL
            ORDER BY due_date"#,
        )
        .bind(template_id)
        .fetch_all(self.pool())
        .await?;
        Ok(occurrences)
    }

    async fn delete_occurrence(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE task_instances SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Occurrence with id {} not found",
                id
            )));
        }
        Ok(())
    }
}
