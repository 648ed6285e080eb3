use chrono::NaiveTime;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use taskgen_core::generator::GeneratorConfig;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
}

/// When the daily generation cycle fires
#[derive(Deserialize, Debug)]
pub struct ScheduleSettings {
    /// Time-of-day ("HH:MM") in the processing timezone
    pub run_at: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            run_at: "00:00".to_string(),
        }
    }
}

/// Configuration for the generation engine
#[derive(Deserialize, Debug)]
pub struct GeneratorSettings {
    /// Templates fetched per storage round-trip
    pub page_size: i64,
    /// Fixed zone used for "current month" and weekday computation (IANA format)
    pub processing_timezone: String,
    /// Time-of-day ("HH:MM") stamped onto generated due dates
    pub due_time: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            processing_timezone: detect_system_timezone(),
            due_time: "23:59".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let toml = match path {
            Some(p) => Toml::file(p),
            None => Toml::file("taskgen.toml"),
        };
        Figment::new()
            .merge(toml)
            .merge(Env::prefixed("TASKGEN_"))
            .extract()
    }

    /// The engine-side config, with the time strings parsed.
    pub fn generator_config(&self) -> anyhow::Result<GeneratorConfig> {
        Ok(GeneratorConfig {
            page_size: self.generator.page_size,
            processing_timezone: self.generator.processing_timezone.clone(),
            due_time: parse_time_of_day(&self.generator.due_time)?,
        })
    }

    pub fn run_at(&self) -> anyhow::Result<NaiveTime> {
        parse_time_of_day(&self.schedule.run_at)
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        Tz::from_str(&self.generator.processing_timezone).map_err(|_| {
            anyhow::anyhow!(
                "invalid processing timezone '{}'",
                self.generator.processing_timezone
            )
        })
    }
}

fn default_database_path() -> String {
    "tracker.db".to_string()
}

fn parse_time_of_day(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| anyhow::anyhow!("invalid time of day '{}', expected HH:MM", raw))
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if Tz::from_str(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if Tz::from_str(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}
