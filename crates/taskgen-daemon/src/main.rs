mod config;

use anyhow::Context;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use clap::Parser;
use std::path::PathBuf;
use taskgen_core::generator::InstanceGenerator;
use taskgen_core::repository::SqliteRepository;
use taskgen_core::timezone::local_instant;
use taskgen_core::db;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Background generator for recurring task occurrences.
///
/// Runs one generation cycle per day at the configured time, expanding every
/// task template into concrete occurrences for the current month.
#[derive(Parser, Debug)]
#[command(name = "taskgend", version, about)]
struct Cli {
    /// Path to the configuration file (default: taskgen.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured database path
    #[arg(long)]
    database: Option<String>,

    /// Run a single generation cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let db_path = cli.database.unwrap_or_else(|| config.database_path.clone());
    let pool = db::establish_connection(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path))?;

    let generator = InstanceGenerator::new(SqliteRepository::new(pool), config.generator_config()?)?;

    if cli.once {
        let summary = generator.run_cycle(Utc::now()).await?;
        info!(
            templates_processed = summary.templates_processed,
            occurrences_created = summary.occurrences_created,
            templates_failed = summary.templates_failed,
            "one-shot cycle complete"
        );
        return Ok(());
    }

    let timezone = config.timezone()?;
    let run_at = config.run_at()?;
    info!(
        timezone = %timezone,
        run_at = %run_at,
        database = %db_path,
        "daemon started, waiting for next scheduled cycle"
    );

    loop {
        let wait = duration_until_next(Utc::now(), timezone, run_at);
        tokio::time::sleep(wait).await;

        // A failed cycle is retried at the next tick; the dedup key check
        // makes the retry pick up exactly where this one left off.
        match generator.run_cycle(Utc::now()).await {
            Ok(summary) => info!(
                templates_processed = summary.templates_processed,
                occurrences_created = summary.occurrences_created,
                templates_failed = summary.templates_failed,
                "scheduled cycle complete"
            ),
            Err(err) => error!(
                error = %err,
                "generation cycle failed, will retry at next scheduled run"
            ),
        }
    }
}

/// Time until the next occurrence of `run_at` in `tz`, strictly after `now`.
fn duration_until_next(now: DateTime<Utc>, tz: Tz, run_at: NaiveTime) -> std::time::Duration {
    let local = now.with_timezone(&tz);
    let mut next_date = local.date_naive();
    if local.time() >= run_at {
        next_date = next_date.succ_opt().unwrap_or(next_date);
    }
    let next = local_instant(tz, next_date, run_at);
    (next - now).to_std().unwrap_or_default()
}
