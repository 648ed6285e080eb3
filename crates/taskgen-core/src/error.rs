use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid recurrence rule for template {template_id}: {reason}")]
    InvalidRule { template_id: Uuid, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("An occurrence already exists for template {template_id} on {due_date}")]
    DuplicateOccurrence {
        template_id: Uuid,
        due_date: NaiveDate,
    },
}
