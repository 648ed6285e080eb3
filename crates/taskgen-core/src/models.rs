use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

/// How often a template repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid cadence: {0}")]
pub struct ParseCadenceError(String);

impl FromStr for Cadence {
    type Err = ParseCadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Cadence::Daily),
            "weekly" | "week" => Ok(Cadence::Weekly),
            "monthly" | "month" => Ok(Cadence::Monthly),
            _ => Err(ParseCadenceError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Pending,
    Complete,
    Overdue,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid occurrence status: {0}")]
pub struct ParseOccurrenceStatusError(String);

impl FromStr for OccurrenceStatus {
    type Err = ParseOccurrenceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OccurrenceStatus::Pending),
            "complete" => Ok(OccurrenceStatus::Complete),
            "overdue" => Ok(OccurrenceStatus::Overdue),
            _ => Err(ParseOccurrenceStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum OccurrencePriority {
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid occurrence priority: {0}")]
pub struct ParseOccurrencePriorityError(String);

impl FromStr for OccurrencePriority {
    type Err = ParseOccurrencePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(OccurrencePriority::Low),
            "medium" => Ok(OccurrencePriority::Medium),
            "high" => Ok(OccurrencePriority::High),
            _ => Err(ParseOccurrencePriorityError(s.to_string())),
        }
    }
}

/// A stored task template describing how a task repeats.
///
/// The generator treats rules as read-only: they are created and edited by the
/// CRUD layer, and the engine only ever reads them when expanding occurrences.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurrenceRule {
    /// Primary key, UUIDv7 for time-ordered paging
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub cadence: Cadence,
    /// Comma-separated weekday names (e.g. "Monday,Thursday").
    /// Required non-empty for Weekly, None for other cadences.
    pub weekly_days: Option<String>,
    /// Inclusive lower bound for occurrence generation
    pub start_date: NaiveDate,
    /// Inclusive upper bound; None means unbounded
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; deleted rules are skipped by the generator
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    /// Parses the stored weekday list into a canonical set.
    ///
    /// Day names are matched case-insensitively ("monday" == "Monday").
    /// A Weekly rule with no parseable days is a malformed rule, reported as
    /// [`CoreError::InvalidRule`] so the generator can isolate it.
    pub fn weekly_day_set(&self) -> Result<HashSet<Weekday>, CoreError> {
        let raw = self.weekly_days.as_deref().unwrap_or("");
        let mut days = HashSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = part.parse::<Weekday>().map_err(|_| CoreError::InvalidRule {
                template_id: self.id,
                reason: format!("unrecognized weekday '{}'", part),
            })?;
            days.insert(day);
        }
        if days.is_empty() {
            return Err(CoreError::InvalidRule {
                template_id: self.id,
                reason: "weekly rule has an empty day set".to_string(),
            });
        }
        Ok(days)
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            project_id: None,
            title: "".to_string(),
            description: None,
            cadence: Cadence::Daily,
            weekly_days: None,
            start_date: Utc::now().date_naive(),
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }
}

/// One concrete, datable task instance generated from a rule.
///
/// Created exactly once by the engine when its due date first enters the
/// target window; afterwards it belongs to the rest of the application and
/// the engine never revisits it, deleted or not.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskOccurrence {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    /// Owning rule; weak reference used for lookup and dedup only
    #[serde(with = "uuid::serde::compact")]
    pub template_id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: OccurrencePriority,
    pub status: OccurrenceStatus,
    /// Calendar date component of the dedup key `(template_id, due_date)`
    pub due_date: NaiveDate,
    /// The due instant: `due_date` at the configured due time-of-day in the
    /// processing timezone
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Data required to create a new recurrence rule
#[derive(Debug, Clone)]
pub struct NewTemplateData {
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub cadence: Cadence,
    pub weekly_days: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Data required to persist a generated occurrence
#[derive(Debug, Clone)]
pub struct NewOccurrenceData {
    pub template_id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub due_at: DateTime<Utc>,
}
