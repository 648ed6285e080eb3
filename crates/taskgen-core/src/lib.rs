//! # Taskgen Core Library
//!
//! The materialization engine behind a personal task tracker: expands stored
//! recurrence rules ("every Monday and Thursday until date B") into concrete
//! task occurrences, once per scheduled cycle, without ever duplicating or
//! losing an occurrence.
//!
//! ## Features
//!
//! - **Pure Expansion**: Recurrence rules expand into calendar dates through a
//!   deterministic function with no hidden state
//! - **Idempotent Generation**: A uniqueness key on `(template, date)` makes
//!   every cycle safe to re-run, including against soft-deleted rows
//! - **Fault Isolation**: One malformed template never blocks the rest of the
//!   population from generating its occurrences
//! - **Bounded Memory**: Templates are processed in fixed-size pages, so the
//!   footprint does not grow with the template count
//! - **Type Safety**: Compile-time checked SQL with sqlx
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Recurrence rules, occurrences, and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`recurrence`]: Date-expansion algorithm for recurrence rules
//! - [`generator`]: Batch cycle runner with paging and failure isolation
//! - [`timezone`]: Fixed processing-timezone utilities
//! - [`error`]: Error types with context
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use taskgen_core::{
//!     db,
//!     generator::{GeneratorConfig, InstanceGenerator},
//!     repository::SqliteRepository,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), taskgen_core::error::CoreError> {
//!     let pool = db::establish_connection("tracker.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let generator = InstanceGenerator::new(repo, GeneratorConfig::default())?;
//!     let summary = generator.run_cycle(Utc::now()).await?;
//!
//!     println!(
//!         "created {} occurrences across {} templates",
//!         summary.occurrences_created, summary.templates_processed
//!     );
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod timezone;
