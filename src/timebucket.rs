//! Maps instants onto the week and half-day buckets used as record keys.
//!
//! Every function takes the group timezone explicitly; nothing here reads
//! the process-local timezone or the system clock.

use std::sync::OnceLock;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc, Weekday,
};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::{Result, TurnipBotError};

const GAP_STEP_MINUTES: i64 = 15;
const GAP_MAX_STEPS: i64 = 24 * 60 / GAP_STEP_MINUTES;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfDay {
    Am,
    Pm,
}

impl HalfDay {
    pub fn as_str(self) -> &'static str {
        match self {
            HalfDay::Am => "AM",
            HalfDay::Pm => "PM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucketer {
    week_start: Weekday,
}

impl Default for TimeBucketer {
    fn default() -> Self {
        Self::new(Weekday::Mon)
    }
}

impl TimeBucketer {
    pub fn new(week_start: Weekday) -> Self {
        Self { week_start }
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn beginning_of_week<Z: TimeZone>(&self, instant: &DateTime<Z>, tz: Tz) -> DateTime<Tz> {
        let date = self.week_start_date(instant.with_timezone(&tz).date_naive());
        local_midnight(tz, date)
    }

    /// Exclusive end of the week: the beginning of the following one.
    pub fn end_of_week<Z: TimeZone>(&self, instant: &DateTime<Z>, tz: Tz) -> DateTime<Tz> {
        let date = self.week_start_date(instant.with_timezone(&tz).date_naive());
        local_midnight(tz, date + Duration::days(7))
    }

    pub fn week_range<Z: TimeZone>(
        &self,
        instant: &DateTime<Z>,
        tz: Tz,
    ) -> (DateTime<Tz>, DateTime<Tz>) {
        (
            self.beginning_of_week(instant, tz),
            self.end_of_week(instant, tz),
        )
    }

    fn week_start_date(&self, date: NaiveDate) -> NaiveDate {
        let days_back = (date.weekday().num_days_from_monday() + 7
            - self.week_start.num_days_from_monday())
            % 7;
        date - Duration::days(i64::from(days_back))
    }
}

pub fn beginning_of_day<Z: TimeZone>(instant: &DateTime<Z>, tz: Tz) -> DateTime<Tz> {
    local_midnight(tz, instant.with_timezone(&tz).date_naive())
}

/// Local midnight when `instant` is before local noon, local noon otherwise.
pub fn half_day_bucket<Z: TimeZone>(instant: &DateTime<Z>, tz: Tz) -> DateTime<Tz> {
    let local = instant.with_timezone(&tz);
    let date = local.date_naive();
    let noon = resolve_local(tz, date.and_time(noon_time()));
    if local < noon {
        local_midnight(tz, date)
    } else {
        noon
    }
}

pub fn half_day_of(bucket: &DateTime<Tz>) -> HalfDay {
    if bucket.hour() < 12 {
        HalfDay::Am
    } else {
        HalfDay::Pm
    }
}

pub fn half_day_label(bucket: &DateTime<Tz>) -> String {
    format!(
        "{} {}",
        bucket.format("%a %d/%m/%Y"),
        half_day_of(bucket).as_str()
    )
}

/// Parses user supplied date text in the group timezone.
///
/// Accepted shapes are full dates with a time (`2020-04-15 13:30`,
/// `15/04/2020 13:30`, RFC 3339) and a day followed by `am`, `pm` or a time
/// of day. The day is a calendar date, `today`, `yesterday`, a weekday name
/// or `last <weekday>`. A bare weekday is the most recent one up to today;
/// `last <weekday>` is the most recent one strictly before today. Text
/// without a time or half-day is rejected, as is any local time skipped or
/// repeated by a DST transition and any half-day that starts after `now`.
pub fn parse_local_date<Z: TimeZone>(
    text: &str,
    tz: Tz,
    now: &DateTime<Z>,
) -> Result<DateTime<Tz>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(date_error(text, "empty input"));
    }

    let parsed = parse_explicit(text, tz, now)?;
    if half_day_bucket(&parsed, tz) > now.with_timezone(&tz) {
        return Err(date_error(text, "half-day has not started yet"));
    }
    Ok(parsed)
}

fn parse_explicit<Z: TimeZone>(text: &str, tz: Tz, now: &DateTime<Z>) -> Result<DateTime<Tz>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&tz));
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return exact_local(tz, naive)
                .ok_or_else(|| date_error(text, "local time skipped or repeated by DST"));
        }
    }

    let captures = day_time_regex()
        .captures(text)
        .ok_or_else(|| date_error(text, "expected a day followed by am, pm or a time"))?;
    let day_text = captures.name("day").map(|m| m.as_str()).unwrap_or_default();
    let time_text = captures.name("time").map(|m| m.as_str()).unwrap_or_default();

    let today = now.with_timezone(&tz).date_naive();
    let date = resolve_day(day_text, today).ok_or_else(|| date_error(text, "unknown day"))?;
    let time = parse_time_of_day(time_text).ok_or_else(|| date_error(text, "bad time"))?;
    exact_local(tz, date.and_time(time))
        .ok_or_else(|| date_error(text, "local time skipped or repeated by DST"))
}

fn resolve_day(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    match words.as_slice() {
        ["today"] => Some(today),
        ["yesterday"] => today.pred_opt(),
        [weekday] => Some(latest_weekday(today, weekday.parse().ok()?, 0)),
        ["last", weekday] => Some(latest_weekday(today, weekday.parse().ok()?, 1)),
        _ => None,
    }
}

/// Most recent `weekday` at least `min_days_back` days before `today`.
fn latest_weekday(today: NaiveDate, weekday: Weekday, min_days_back: u32) -> NaiveDate {
    let mut back =
        (7 + today.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    if back < min_days_back {
        back += 7;
    }
    today - Duration::days(i64::from(back))
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let lower = text.to_lowercase().replace(' ', "");
    match lower.as_str() {
        "am" => Some(NaiveTime::MIN),
        "pm" => Some(noon_time()),
        _ => {
            // Only the time of day is taken from the result, so any anchor works.
            let anchor = Utc.timestamp_opt(0, 0).single()?;
            parse_date_string(&lower, anchor, Dialect::Uk)
                .ok()
                .map(|parsed| parsed.time())
        }
    }
}

fn day_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<day>.+?)\s+(?P<time>am|pm|\d{1,2}(?:[:.]\d{2})?\s*(?:am|pm)|\d{1,2}:\d{2}(?::\d{2})?)$",
        )
        .unwrap()
    })
}

fn date_error(text: &str, reason: &str) -> TurnipBotError {
    TurnipBotError::DateParse(format!("`{text}`: {reason}"))
}

fn noon_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

fn exact_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

/// Resolves a local wall time to an instant for use as a bucket boundary.
/// Repeated wall times take the earlier instant; skipped ones move forward
/// to the first wall time that exists.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..GAP_MAX_STEPS {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::minutes(GAP_STEP_MINUTES),
        }
    }
    tz.from_utc_datetime(&naive)
}
