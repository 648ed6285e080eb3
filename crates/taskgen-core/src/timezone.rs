use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate and parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Resolve a local calendar date and time-of-day in `tz` to a UTC instant.
///
/// Ambiguous local times (DST fall-back) take the earlier mapping. Local times
/// that do not exist (DST spring-forward gap) slide forward one hour; if that
/// still does not resolve, the naive time is interpreted as UTC.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive).earliest() {
        Some(local_dt) => local_dt.with_timezone(&Utc),
        None => {
            let shifted = naive + chrono::Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(local_dt) => local_dt.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}
