//! Week boundary and timestamp helpers.
//!
//! Weeks start Monday 00:00:00.000 in the caller's time zone and are stored as
//! UTC ISO-8601 strings with millisecond precision (`2026-10-12T00:00:00.000Z`).

use chrono::{DateTime, Datelike, Duration, Local, SecondsFormat, TimeZone, Utc};

/// Start (Monday midnight, same zone) of the calendar week containing `now`.
pub fn week_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let days_back = i64::from(now.weekday().num_days_from_monday());
    let monday = now.date_naive() - Duration::days(days_back);
    monday
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        // Midnight can fall into a DST gap; keep the instant we were given
        .unwrap_or_else(|| now.clone())
}

pub fn to_iso<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn week_start_iso<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    to_iso(&week_start(now))
}

/// One instant as seen by an engine operation: item timestamps, snapshot end
/// date and the week boundary for records created on the fly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moment {
    pub millis: i64,
    pub iso: String,
    pub week_start: String,
}

impl Moment {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self {
            millis: now.timestamp_millis(),
            iso: to_iso(now),
            week_start: week_start_iso(now),
        }
    }

    pub fn now() -> Self {
        Self::at(&Local::now())
    }
}

pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
