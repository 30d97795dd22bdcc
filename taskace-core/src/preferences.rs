//! User-tunable scheduling parameters and the time-of-day affinity table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::notify::{ChangeFeed, StoreEvent};
use crate::task::MAX_DURATION_MINUTES;
use crate::time::TimeOfDay;

/// Coarse part of the day. Used both as the user's preferred study time and
/// as the bucket a slot's start time falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    /// Morning 05:00-12:00, afternoon 12:00-17:00, evening 17:00-22:00, night otherwise.
    pub fn of(t: TimeOfDay) -> DayPart {
        match t.hour() {
            5..=11 => DayPart::Morning,
            12..=16 => DayPart::Afternoon,
            17..=21 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }

    /// How well a slot in `slot` suits someone who prefers `self` (3 best, 0 worst).
    pub fn affinity(self, slot: DayPart) -> u8 {
        use DayPart::*;
        match (self, slot) {
            (Morning, Morning) => 3,
            (Morning, Afternoon) => 2,
            (Morning, Evening) => 1,
            (Morning, Night) => 0,

            (Afternoon, Afternoon) => 3,
            (Afternoon, Evening) => 2,
            (Afternoon, Morning) => 1,
            (Afternoon, Night) => 0,

            (Evening, Evening) => 3,
            (Evening, Afternoon) => 2,
            (Evening, Morning) => 1,
            (Evening, Night) => 0,

            (Night, Night) => 3,
            (Night, Evening) => 2,
            (Night, Afternoon) => 1,
            (Night, Morning) => 0,
        }
    }
}

impl fmt::Display for DayPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayPart::Morning => f.write_str("morning"),
            DayPart::Afternoon => f.write_str("afternoon"),
            DayPart::Evening => f.write_str("evening"),
            DayPart::Night => f.write_str("night"),
        }
    }
}

impl FromStr for DayPart {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(DayPart::Morning),
            "afternoon" => Ok(DayPart::Afternoon),
            "evening" => Ok(DayPart::Evening),
            "night" => Ok(DayPart::Night),
            _ => Err(EngineError::invalid(
                "preferredStudyTime",
                format!("expected morning|afternoon|evening|night, got '{s}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub preferred_study_time: DayPart,
    pub max_tasks_per_day: u32,
    /// Minutes between two packed tasks.
    pub break_duration: u32,
    /// Minutes used for tasks without an explicit estimate.
    pub study_session_duration: u32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferred_study_time: DayPart::Afternoon,
            max_tasks_per_day: 5,
            break_duration: 15,
            study_session_duration: 45,
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> EngineResult<()> {
        for (field, value) in [
            ("maxTasksPerDay", self.max_tasks_per_day),
            ("breakDuration", self.break_duration),
            ("studySessionDuration", self.study_session_duration),
        ] {
            if value == 0 {
                return Err(EngineError::invalid(field, "must be positive"));
            }
        }
        for (field, minutes) in [
            ("breakDuration", self.break_duration),
            ("studySessionDuration", self.study_session_duration),
        ] {
            if minutes > MAX_DURATION_MINUTES {
                return Err(EngineError::invalid(
                    field,
                    format!("must be at most {MAX_DURATION_MINUTES} minutes"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub preferred_study_time: Option<DayPart>,
    pub max_tasks_per_day: Option<u32>,
    pub break_duration: Option<u32>,
    pub study_session_duration: Option<u32>,
}

impl PreferencesPatch {
    fn merged(&self, base: UserPreferences) -> UserPreferences {
        UserPreferences {
            preferred_study_time: self.preferred_study_time.unwrap_or(base.preferred_study_time),
            max_tasks_per_day: self.max_tasks_per_day.unwrap_or(base.max_tasks_per_day),
            break_duration: self.break_duration.unwrap_or(base.break_duration),
            study_session_duration: self
                .study_session_duration
                .unwrap_or(base.study_session_duration),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    current: UserPreferences,
    changes: ChangeFeed,
}

impl PreferenceStore {
    pub fn new(preferences: UserPreferences) -> EngineResult<Self> {
        preferences.validate()?;
        Ok(Self {
            current: preferences,
            changes: ChangeFeed::default(),
        })
    }

    pub fn get(&self) -> &UserPreferences {
        &self.current
    }

    /// Apply a partial update atomically: nothing changes if the merged result is invalid.
    pub fn update(&mut self, patch: &PreferencesPatch) -> EngineResult<&UserPreferences> {
        let next = patch.merged(self.current);
        next.validate()?;
        self.current = next;
        self.changes.emit(StoreEvent::PreferencesChanged);
        Ok(&self.current)
    }

    pub fn take_changes(&mut self) -> Vec<StoreEvent> {
        self.changes.drain()
    }
}
