//! Time utilities: timezone-aware deadlines, local calendar days, and
//! minute-of-day values for schedule templates.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

fn local_to_utc(local: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Parse a user-supplied deadline.
///
/// Accepted forms:
/// - `2026-02-20 17:00` local time
/// - `2026-02-20` end of that local day (23:59)
/// - `+3d`, `+6h`, `+90m` relative to `now`
pub fn parse_deadline(input: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();

    let relative = Regex::new(r"^\+(\d{1,4})([mhd])$")?;
    if let Some(caps) = relative.captures(input) {
        let amount: i64 = caps[1]
            .parse()
            .with_context(|| format!("invalid amount in '{input}'"))?;
        let delta = match &caps[2] {
            "m" => Duration::minutes(amount),
            "h" => Duration::hours(amount),
            _ => Duration::days(amount),
        };
        return Ok(now + delta);
    }

    let date_only = Regex::new(r"^\d{4}-\d{2}-\d{2}$")?;
    if date_only.is_match(input) {
        return local_to_utc(&format!("{input} 23:59"), tz);
    }

    local_to_utc(input, tz)
}

/// Calendar day of `dt` as seen in `tz`.
pub fn local_day(dt: DateTime<Utc>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

/// The instant `months` calendar months before `now`, measured in `tz`.
pub fn months_before(now: DateTime<Utc>, months: u32, tz: Tz) -> DateTime<Utc> {
    now.with_timezone(&tz)
        .checked_sub_months(Months::new(months))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A wall-clock time of day with minute precision, serialized as `HH:MM`.
///
/// Carries no date; schedule items recur daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MINUTES_PER_DAY: u32 = 24 * 60;

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Build from minutes past midnight; `None` at or past 24:00.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < Self::MINUTES_PER_DAY).then_some(Self(minutes as u16))
    }

    pub fn minutes(self) -> u32 {
        self.0 as u32
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .with_context(|| format!("expected HH:MM, got '{s}'"))?;
        let hour: u32 = h.parse().with_context(|| format!("invalid hour in '{s}'"))?;
        if m.len() != 2 {
            anyhow::bail!("expected two-digit minutes in '{s}'");
        }
        let minute: u32 = m.parse().with_context(|| format!("invalid minute in '{s}'"))?;
        Self::new(hour, minute).with_context(|| format!("time out of range: '{s}'"))
    }

    /// 12-hour clock label, e.g. `9:05 AM`, `12:00 PM`.
    pub fn label_12h(self) -> String {
        let period = if self.hour() >= 12 { "PM" } else { "AM" };
        let display = match self.hour() % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", display, self.minute(), period)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        TimeOfDay::parse(&value).map_err(|e| e.to_string())
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}
