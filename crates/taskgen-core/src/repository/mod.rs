use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{NewOccurrenceData, NewTemplateData, RecurrenceRule, TaskOccurrence};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

// Re-export domain modules
pub mod instances;
pub mod templates;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for recurrence-rule (template) operations.
///
/// The generator only ever calls [`list_templates`](Self::list_templates);
/// the rest is the persistence surface the CRUD layer goes through, which is
/// also where malformed rules are supposed to be rejected.
#[async_trait]
pub trait TemplateRepository {
    async fn add_template(&self, data: NewTemplateData) -> Result<RecurrenceRule, CoreError>;
    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    /// Non-deleted templates in stable ascending-id order. Paged: callers
    /// detect the end of the population by a short page, so templates
    /// inserted mid-scan cannot cause rows to be skipped.
    async fn list_templates(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn delete_template(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for generated-occurrence operations
#[async_trait]
pub trait InstanceRepository {
    /// Looks up the occurrence for a dedup key, **including soft-deleted
    /// rows** — a deleted occurrence still claims its `(template, date)` key.
    async fn find_occurrence(
        &self,
        template_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, CoreError>;
    /// Like [`find_occurrence`](Self::find_occurrence) but only matches live rows.
    async fn find_active_occurrence(
        &self,
        template_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, CoreError>;
    /// Inserts a new Pending occurrence. A uniqueness conflict on
    /// `(template_id, due_date)` surfaces as [`CoreError::DuplicateOccurrence`].
    async fn create_occurrence(
        &self,
        data: NewOccurrenceData,
    ) -> Result<TaskOccurrence, CoreError>;
    async fn find_occurrences_for_template(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<TaskOccurrence>, CoreError>;
    async fn delete_occurrence(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Storage gateway consumed by the generator, composing the domain traits
#[async_trait]
pub trait Repository: TemplateRepository + InstanceRepository + Send + Sync {}

impl<T: TemplateRepository + InstanceRepository + Send + Sync> Repository for T {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}
