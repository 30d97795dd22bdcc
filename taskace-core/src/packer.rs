//! Slot packer: greedy, head-of-queue placement of ranked tasks into the
//! plannable windows of the active template over a multi-day horizon.
//!
//! Per day:
//! 1) take the template's Free Time / Work/Study windows
//! 2) order them by affinity to the preferred study time (stable)
//! 3) per window, filter the remaining ranked tasks by placement rules
//! 4) place the head task while it fits; stop the window at the first miss
//!
//! A task is placed at most once across the whole horizon. The packer never
//! shrinks a task below its effective duration to make it fit.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::preferences::{DayPart, UserPreferences};
use crate::task::{Category, Priority, Task};
use crate::templates::{ScheduleItem, ScheduleTemplate};
use crate::time::TimeOfDay;

pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Windows of at most this many minutes are reserved for breaks and rewards.
pub const SHORT_SLOT_MINUTES: u32 = 60;

/// Study tasks never start in a window opening at or after 22:00 or before 06:00.
const LATE_NIGHT_FROM: u32 = 22 * 60;
const LATE_NIGHT_UNTIL: u32 = 6 * 60;

/// A task placed on a concrete date and time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub task: Task,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    /// e.g. "9:00 AM - 9:45 AM"
    pub time_slot: String,
}

/// Minutes a task occupies once category and priority clamps apply.
pub fn effective_duration(task: &Task, prefs: &UserPreferences) -> u32 {
    let mut minutes = task
        .estimated_duration
        .unwrap_or(prefs.study_session_duration);

    if task.category.is_study() {
        minutes = minutes.max(45);
    } else if task.category == Category::Breaks {
        minutes = minutes.min(30);
    }

    match task.priority {
        Priority::High => minutes.max(50),
        Priority::Low => minutes.min(40),
        Priority::Medium => minutes,
    }
}

fn is_late_night(start: TimeOfDay) -> bool {
    let m = start.minutes();
    m >= LATE_NIGHT_FROM || m < LATE_NIGHT_UNTIL
}

/// Remaining tasks allowed into `slot`, in rank order.
fn eligible_for<'a>(
    ranked: &[&'a Task],
    placed: &HashSet<&str>,
    slot: &ScheduleItem,
) -> Vec<&'a Task> {
    let short = slot.duration_minutes() <= SHORT_SLOT_MINUTES;
    let late = is_late_night(slot.start_time);

    let open: Vec<&Task> = ranked
        .iter()
        .copied()
        .filter(|t| !placed.contains(t.id.as_str()))
        .filter(|t| !(late && t.category.is_study()))
        .filter(|t| short || !t.category.is_break_or_reward())
        .collect();

    if short && open.iter().any(|t| t.category.is_break_or_reward()) {
        return open
            .into_iter()
            .filter(|t| t.category.is_break_or_reward())
            .collect();
    }

    // Daily Responsibilities in morning windows are welcome like any other
    // eligible task; the global rank order is kept.
    open
}

/// Pack `ranked` tasks into `horizon_days` days starting at `start`.
///
/// Pure: identical inputs always give identical output.
pub fn pack(
    ranked: &[&Task],
    template: &ScheduleTemplate,
    prefs: &UserPreferences,
    start: NaiveDate,
    horizon_days: u32,
) -> Vec<Assignment> {
    let slots: Vec<&ScheduleItem> = template.plannable_slots().collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for offset in 0..horizon_days {
        let Some(date) = start.checked_add_days(Days::new(offset.into())) else {
            break;
        };

        let mut day_slots = slots.clone();
        day_slots.sort_by_key(|s| {
            std::cmp::Reverse(prefs.preferred_study_time.affinity(DayPart::of(s.start_time)))
        });

        for slot in day_slots {
            let slot_end = slot.end_time.minutes();
            let mut cursor = slot.start_time.minutes();

            for task in eligible_for(ranked, &placed, slot) {
                if cursor >= slot_end {
                    break;
                }
                let minutes = effective_duration(task, prefs);
                let Some(end) = cursor.checked_add(minutes).filter(|&end| end <= slot_end) else {
                    break;
                };
                let (Some(start_time), Some(end_time)) =
                    (TimeOfDay::from_minutes(cursor), TimeOfDay::from_minutes(end))
                else {
                    break;
                };

                out.push(Assignment {
                    task: task.clone(),
                    date,
                    start_time,
                    end_time,
                    time_slot: format!("{} - {}", start_time.label_12h(), end_time.label_12h()),
                });
                placed.insert(task.id.as_str());
                let Some(next) = end.checked_add(prefs.break_duration) else {
                    break;
                };
                cursor = next;
            }
        }
    }

    out
}
