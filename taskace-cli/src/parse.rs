//! Argument helpers that need more than clap's built-in parsers.

use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate};
use regex::Regex;
use taskace_core::{ScheduleItemDraft, TimeOfDay};

/// `"09:00-11:00 Work/Study"` -> one template item.
pub fn parse_schedule_item(input: &str) -> Result<ScheduleItemDraft> {
    let re = Regex::new(r"^\s*(\d{1,2}:\d{2})\s*-\s*(\d{1,2}:\d{2})\s+(.+?)\s*$")?;
    let caps = re
        .captures(input)
        .with_context(|| format!("expected 'HH:MM-HH:MM Activity', got '{input}'"))?;

    let start = TimeOfDay::parse(&caps[1])?;
    let end = TimeOfDay::parse(&caps[2])?;
    if start >= end {
        bail!("item '{input}' must end after it starts");
    }
    Ok(ScheduleItemDraft::new(start, end, &caps[3]))
}

/// `YYYY-MM-DD`, `today` or `yesterday`.
pub fn parse_day(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .checked_sub_days(Days::new(1))
            .context("date out of range"),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{input}' (expected YYYY-MM-DD)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_item_parses_label_with_spaces() {
        let item = parse_schedule_item("9:30 - 12:00  Free Time ").unwrap();
        assert_eq!(item.start_time, TimeOfDay::new(9, 30).unwrap());
        assert_eq!(item.end_time, TimeOfDay::new(12, 0).unwrap());
        assert_eq!(item.activity, "Free Time");
    }

    #[test]
    fn schedule_item_rejects_wraparound_and_garbage() {
        assert!(parse_schedule_item("23:00-01:00 Work/Study").is_err());
        assert!(parse_schedule_item("morning Work/Study").is_err());
        assert!(parse_schedule_item("09:00-10:00").is_err());
    }

    #[test]
    fn day_keywords_are_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(parse_day("Today", today).unwrap(), today);
        assert_eq!(
            parse_day("yesterday", today).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert_eq!(
            parse_day("2026-01-15", today).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
        assert!(parse_day("15/01/2026", today).is_err());
    }
}
