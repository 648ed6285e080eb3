//! Batch cycle runner: drives materialization across the whole template
//! population once per scheduled period.
//!
//! The runner is stateless between cycles. Each cycle derives its target
//! window (the calendar month containing `now` in the processing timezone)
//! from scratch and re-checks every dedup key against storage, so an
//! interrupted or repeated cycle is always safe to re-run.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::models::{NewOccurrenceData, RecurrenceRule};
use crate::recurrence::expand;
use crate::repository::Repository;
use crate::timezone::{local_instant, parse_timezone};

/// Configuration for generation behavior
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Templates fetched per storage round-trip
    pub page_size: i64,
    /// IANA timezone used for "current month" and weekday computation
    pub processing_timezone: String,
    /// Time-of-day stamped onto generated due dates ("due by end of day")
    pub due_time: NaiveTime,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            processing_timezone: "UTC".to_string(),
            due_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        }
    }
}

/// Counters reported at the end of each cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub templates_processed: usize,
    pub occurrences_created: usize,
    pub templates_failed: usize,
}

/// InstanceGenerator: expands every active recurrence rule into concrete
/// occurrences for the current processing month.
///
/// Responsibilities:
/// 1. Page through the template population in bounded, stable-order pages
/// 2. Expand each rule through the pure [`expand`] function
/// 3. Skip dedup keys that already exist, soft-deleted rows included
/// 4. Isolate per-template failures so one bad rule cannot starve the rest
/// 5. Report per-occurrence and per-cycle outcomes through structured logs
pub struct InstanceGenerator<R> {
    repo: R,
    config: GeneratorConfig,
    timezone: Tz,
}

impl<R: Repository> InstanceGenerator<R> {
    /// Creates a generator, validating the configured timezone up front.
    pub fn new(repo: R, config: GeneratorConfig) -> Result<Self, CoreError> {
        let timezone = parse_timezone(&config.processing_timezone)?;
        Ok(Self {
            repo,
            config,
            timezone,
        })
    }

    /// The storage gateway this generator drives.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Runs one generation cycle for the month containing `now`.
    ///
    /// `now` is an explicit input rather than a wall-clock read so cycles are
    /// deterministic and testable; the scheduler trigger supplies it.
    ///
    /// A storage failure while fetching a page is cycle-fatal and returned as
    /// `Err` for the trigger to retry next period. Failures while processing
    /// a single template are logged, counted in the summary, and do not stop
    /// the cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, CoreError> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let (window_start, window_end) = month_window(today);

        let mut summary = CycleSummary::default();
        let mut offset = 0i64;

        loop {
            let page = self
                .repo
                .list_templates(offset, self.config.page_size)
                .await?;
            let page_len = page.len();

            for rule in page {
                summary.templates_processed += 1;
                match self.materialize_rule(&rule, window_start, window_end).await {
                    Ok(created) => summary.occurrences_created += created,
                    Err(err) => {
                        summary.templates_failed += 1;
                        warn!(
                            template_id = %rule.id,
                            error = %err,
                            "failed to process template, continuing cycle"
                        );
                    }
                }
            }

            // A short page marks the end of the population. Stopping on the
            // page length rather than a pre-computed total keeps the scan
            // correct when templates are inserted mid-cycle.
            if (page_len as i64) < self.config.page_size {
                break;
            }
            offset += self.config.page_size;
        }

        info!(
            templates_processed = summary.templates_processed,
            occurrences_created = summary.occurrences_created,
            templates_failed = summary.templates_failed,
            window_start = %window_start,
            window_end = %window_end,
            "generation cycle complete"
        );

        Ok(summary)
    }

    /// Materializes one rule within the window, returning how many
    /// occurrences were created.
    async fn materialize_rule(
        &self,
        rule: &RecurrenceRule,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<usize, CoreError> {
        let mut created = 0;

        for due_date in expand(rule, window_start, window_end)? {
            if self.repo.find_occurrence(rule.id, due_date).await?.is_some() {
                continue;
            }

            let due_at = local_instant(self.timezone, due_date, self.config.due_time);
            let data = NewOccurrenceData {
                template_id: rule.id,
                owner_id: rule.owner_id,
                project_id: rule.project_id,
                title: rule.title.clone(),
                description: rule.description.clone(),
                due_date,
                due_at,
            };

            match self.repo.create_occurrence(data).await {
                Ok(occurrence) => {
                    created += 1;
                    info!(
                        occurrence_id = %occurrence.id,
                        template_id = %rule.id,
                        due_date = %due_date,
                        timezone = %self.config.processing_timezone,
                        "generated task occurrence"
                    );
                }
                // Another cycle won the insert race; the invariant already
                // holds, so this is a success, not a failure.
                Err(CoreError::DuplicateOccurrence { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(created)
    }
}

/// First and last calendar day of the month containing `today`.
pub fn month_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).unwrap_or(today);
    let next_month = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(today);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Cadence, NewTemplateData, OccurrenceStatus, TaskOccurrence,
    };
    use crate::repository::{InstanceRepository, TemplateRepository};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(cadence: Cadence, weekly_days: Option<&str>, start: NaiveDate) -> RecurrenceRule {
        RecurrenceRule {
            cadence,
            weekly_days: weekly_days.map(str::to_string),
            start_date: start,
            title: "test rule".to_string(),
            ..Default::default()
        }
    }

    /// In-memory stand-in for the storage gateway, with per-template failure
    /// injection for exercising the fault-isolation contract.
    #[derive(Default)]
    struct FakeRepository {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        templates: Vec<RecurrenceRule>,
        occurrences: HashMap<(Uuid, NaiveDate), TaskOccurrence>,
        fail_creates_for: HashSet<Uuid>,
        fail_paging: bool,
        conflict_on_create: bool,
    }

    impl FakeRepository {
        fn with_templates(templates: Vec<RecurrenceRule>) -> Self {
            let mut sorted = templates;
            sorted.sort_by_key(|t| t.id);
            Self {
                state: Mutex::new(FakeState {
                    templates: sorted,
                    ..Default::default()
                }),
            }
        }

        fn fail_creates_for(&self, template_id: Uuid) {
            self.state
                .lock()
                .unwrap()
                .fail_creates_for
                .insert(template_id);
        }

        fn fail_paging(&self) {
            self.state.lock().unwrap().fail_paging = true;
        }

        fn conflict_on_create(&self) {
            self.state.lock().unwrap().conflict_on_create = true;
        }

        fn occurrence_count(&self) -> usize {
            self.state.lock().unwrap().occurrences.len()
        }

        fn occurrences_for(&self, template_id: Uuid) -> Vec<TaskOccurrence> {
            let mut v: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .occurrences
                .values()
                .filter(|o| o.template_id == template_id)
                .cloned()
                .collect();
            v.sort_by_key(|o| o.due_date);
            v
        }

        fn soft_delete(&self, template_id: Uuid, due_date: NaiveDate) {
            let mut state = self.state.lock().unwrap();
            if let Some(occ) = state.occurrences.get_mut(&(template_id, due_date)) {
                occ.deleted_at = Some(Utc::now());
            }
        }
    }

    #[async_trait]
    impl TemplateRepository for FakeRepository {
        async fn add_template(
            &self,
            _data: NewTemplateData,
        ) -> Result<RecurrenceRule, CoreError> {
            unimplemented!("tests construct rules directly")
        }

        async fn find_template_by_id(
            &self,
            id: Uuid,
        ) -> Result<Option<RecurrenceRule>, CoreError> {
            let state = self.state.lock().unwrap();
            Ok(state.templates.iter().find(|t| t.id == id).cloned())
        }

        async fn list_templates(
            &self,
            offset: i64,
            limit: i64,
        ) -> Result<Vec<RecurrenceRule>, CoreError> {
            let state = self.state.lock().unwrap();
            if state.fail_paging {
                return Err(CoreError::NotFound("storage unreachable".to_string()));
            }
            Ok(state
                .templates
                .iter()
                .filter(|t| t.deleted_at.is_none())
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn delete_template(&self, _id: Uuid) -> Result<(), CoreError> {
            unimplemented!("tests construct rules directly")
        }
    }

    #[async_trait]
    impl InstanceRepository for FakeRepository {
        async fn find_occurrence(
            &self,
            template_id: Uuid,
            due_date: NaiveDate,
        ) -> Result<Option<TaskOccurrence>, CoreError> {
            let state = self.state.lock().unwrap();
            Ok(state.occurrences.get(&(template_id, due_date)).cloned())
        }

        async fn find_active_occurrence(
            &self,
            template_id: Uuid,
            due_date: NaiveDate,
        ) -> Result<Option<TaskOccurrence>, CoreError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .occurrences
                .get(&(template_id, due_date))
                .filter(|o| o.deleted_at.is_none())
                .cloned())
        }

        async fn create_occurrence(
            &self,
            data: NewOccurrenceData,
        ) -> Result<TaskOccurrence, CoreError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_creates_for.contains(&data.template_id) {
                return Err(CoreError::NotFound("simulated storage error".to_string()));
            }
            let key = (data.template_id, data.due_date);
            if state.conflict_on_create || state.occurrences.contains_key(&key) {
                return Err(CoreError::DuplicateOccurrence {
                    template_id: data.template_id,
                    due_date: data.due_date,
                });
            }
            let occurrence = TaskOccurrence {
                id: Uuid::now_v7(),
                template_id: data.template_id,
                owner_id: data.owner_id,
                project_id: data.project_id,
                title: data.title,
                description: data.description,
                priority: crate::models::OccurrencePriority::Medium,
                status: OccurrenceStatus::Pending,
                due_date: data.due_date,
                due_at: data.due_at,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted_at: None,
            };
            state.occurrences.insert(key, occurrence.clone());
            Ok(occurrence)
        }

        async fn find_occurrences_for_template(
            &self,
            template_id: Uuid,
        ) -> Result<Vec<TaskOccurrence>, CoreError> {
            Ok(self.occurrences_for(template_id))
        }

        async fn delete_occurrence(&self, _id: Uuid) -> Result<(), CoreError> {
            unimplemented!("tests soft-delete through FakeRepository::soft_delete")
        }
    }

    fn generator(repo: FakeRepository) -> InstanceGenerator<FakeRepository> {
        InstanceGenerator::new(repo, GeneratorConfig::default()).unwrap()
    }

    // Mid-March 2025, noon UTC
    fn mid_march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn month_window_spans_full_month() {
        assert_eq!(
            month_window(date(2025, 3, 15)),
            (date(2025, 3, 1), date(2025, 3, 31))
        );
        assert_eq!(
            month_window(date(2025, 2, 1)),
            (date(2025, 2, 1), date(2025, 2, 28))
        );
    }

    #[test]
    fn month_window_handles_year_rollover() {
        assert_eq!(
            month_window(date(2025, 12, 31)),
            (date(2025, 12, 1), date(2025, 12, 31))
        );
    }

    #[tokio::test]
    async fn cycle_is_idempotent() {
        let repo = FakeRepository::with_templates(vec![rule(
            Cadence::Daily,
            None,
            date(2025, 3, 1),
        )]);
        let gen = generator(repo);

        let first = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(first.occurrences_created, 31);

        let second = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(second.occurrences_created, 0);
        assert_eq!(second.templates_failed, 0);
        assert_eq!(gen.repo.occurrence_count(), 31);
    }

    #[tokio::test]
    async fn per_template_failure_does_not_abort_cycle() {
        let rule_a = rule(Cadence::Daily, None, date(2025, 3, 1));
        let rule_b = rule(Cadence::Daily, None, date(2025, 3, 1));
        let a_id = rule_a.id;
        let b_id = rule_b.id;

        let repo = FakeRepository::with_templates(vec![rule_a, rule_b]);
        repo.fail_creates_for(b_id);
        let gen = generator(repo);

        let summary = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(summary.templates_processed, 2);
        assert_eq!(summary.templates_failed, 1);
        assert_eq!(summary.occurrences_created, 31);
        assert_eq!(gen.repo.occurrences_for(a_id).len(), 31);
        assert!(gen.repo.occurrences_for(b_id).is_empty());
    }

    #[tokio::test]
    async fn malformed_weekly_rule_is_isolated() {
        let broken = rule(Cadence::Weekly, None, date(2025, 3, 1));
        let healthy = rule(Cadence::Monthly, None, date(2025, 1, 10));
        let healthy_id = healthy.id;

        let repo = FakeRepository::with_templates(vec![broken, healthy]);
        let gen = generator(repo);

        let summary = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(summary.templates_failed, 1);
        assert_eq!(summary.occurrences_created, 1);
        assert_eq!(
            gen.repo.occurrences_for(healthy_id)[0].due_date,
            date(2025, 3, 10)
        );
    }

    #[tokio::test]
    async fn paging_failure_is_cycle_fatal() {
        let repo = FakeRepository::with_templates(vec![rule(
            Cadence::Daily,
            None,
            date(2025, 3, 1),
        )]);
        repo.fail_paging();
        let gen = generator(repo);

        assert!(gen.run_cycle(mid_march()).await.is_err());
        assert_eq!(gen.repo.occurrence_count(), 0);
    }

    #[tokio::test]
    async fn short_page_terminates_paging() {
        // 7 monthly templates with a page size of 3: three pages, the last short
        let templates: Vec<_> = (0..7)
            .map(|_| rule(Cadence::Monthly, None, date(2025, 1, 10)))
            .collect();
        let repo = FakeRepository::with_templates(templates);
        let gen = InstanceGenerator::new(
            repo,
            GeneratorConfig {
                page_size: 3,
                ..Default::default()
            },
        )
        .unwrap();

        let summary = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(summary.templates_processed, 7);
        assert_eq!(summary.occurrences_created, 7);
    }

    #[tokio::test]
    async fn insert_race_conflict_counts_as_success() {
        // An overlapping cycle wins every insert after our existence check;
        // the invariant already holds, so nothing is a failure.
        let repo = FakeRepository::with_templates(vec![rule(
            Cadence::Daily,
            None,
            date(2025, 3, 1),
        )]);
        repo.conflict_on_create();
        let gen = generator(repo);

        let summary = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(summary.templates_processed, 1);
        assert_eq!(summary.templates_failed, 0);
        assert_eq!(summary.occurrences_created, 0);
    }

    #[tokio::test]
    async fn soft_deleted_occurrence_is_not_recreated() {
        let r = rule(Cadence::Monthly, None, date(2025, 1, 10));
        let template_id = r.id;
        let repo = FakeRepository::with_templates(vec![r]);
        let gen = generator(repo);

        let first = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(first.occurrences_created, 1);

        gen.repo.soft_delete(template_id, date(2025, 3, 10));

        let second = gen.run_cycle(mid_march()).await.unwrap();
        assert_eq!(second.occurrences_created, 0);
        // The soft-deleted row still claims the key
        assert_eq!(gen.repo.occurrence_count(), 1);
    }

    #[tokio::test]
    async fn due_at_uses_processing_timezone() {
        let r = rule(Cadence::Monthly, None, date(2025, 1, 10));
        let template_id = r.id;
        let repo = FakeRepository::with_templates(vec![r]);
        let gen = InstanceGenerator::new(
            repo,
            GeneratorConfig {
                processing_timezone: "Asia/Manila".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        gen.run_cycle(mid_march()).await.unwrap();
        let occ = &gen.repo.occurrences_for(template_id)[0];
        assert_eq!(occ.due_date, date(2025, 3, 10));
        // 23:59 in Manila (UTC+8) is 15:59 UTC
        assert_eq!(
            occ.due_at,
            Utc.with_ymd_and_hms(2025, 3, 10, 15, 59, 0).unwrap()
        );
        assert_eq!(occ.status, OccurrenceStatus::Pending);
    }

    #[test]
    fn invalid_timezone_is_rejected_at_construction() {
        let repo = FakeRepository::default();
        let result = InstanceGenerator::new(
            repo,
            GeneratorConfig {
                processing_timezone: "Not/AZone".to_string(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(CoreError::InvalidTimezone(_))));
    }
}
