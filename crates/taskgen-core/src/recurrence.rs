//! Date-expansion algorithm for recurrence rules.
//!
//! [`expand`] is a pure function from a rule and a bounded window to the set
//! of calendar dates that must exist for that rule. It never touches storage,
//! so re-invoking it with the same inputs always yields the same dates; the
//! caller (the batch generator) is responsible for subtracting the dates that
//! already exist.

use chrono::{Datelike, NaiveDate};

use crate::error::CoreError;
use crate::models::{Cadence, RecurrenceRule};

/// Expands `rule` into its due dates within `[window_start, window_end]`.
///
/// The window is clamped to `[rule.start_date, rule.end_date ?? window_end]`
/// before expansion; an empty intersection yields an empty vec, not an error.
///
/// - `Daily`: every date in the clamped window.
/// - `Weekly`: dates whose weekday is in the rule's day set. An empty or
///   unparseable day set is a malformed rule ([`CoreError::InvalidRule`]).
/// - `Monthly`: at most one date — `start_date`'s day-of-month within the
///   month of `window_start`. Months too short for that day (the 31st in a
///   30-day month) produce nothing; the date is never clamped to month-end.
pub fn expand(
    rule: &RecurrenceRule,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<NaiveDate>, CoreError> {
    let lower = window_start.max(rule.start_date);
    let upper = match rule.end_date {
        Some(end) => window_end.min(end),
        None => window_end,
    };
    if lower > upper {
        return Ok(Vec::new());
    }

    match rule.cadence {
        Cadence::Daily => Ok(lower
            .iter_days()
            .take_while(|d| *d <= upper)
            .collect()),
        Cadence::Weekly => {
            let days = rule.weekly_day_set()?;
            Ok(lower
                .iter_days()
                .take_while(|d| *d <= upper)
                .filter(|d| days.contains(&d.weekday()))
                .collect())
        }
        Cadence::Monthly => {
            let day = rule.start_date.day();
            let candidate =
                NaiveDate::from_ymd_opt(window_start.year(), window_start.month(), day);
            Ok(candidate
                .filter(|d| *d >= lower && *d <= upper)
                .into_iter()
                .collect())
        }
    }
}
