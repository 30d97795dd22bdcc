//! Persisted state: one JSON document keyed like the browser storage the
//! data originally lived in. Missing or `null` keys load as defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::preferences::UserPreferences;
use crate::task::Task;
use crate::templates::ScheduleTemplate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(rename = "taskace_tasks", default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
    #[serde(rename = "taskace_schedules", default, deserialize_with = "null_as_default")]
    pub schedules: Vec<ScheduleTemplate>,
    #[serde(rename = "taskace_points", default, deserialize_with = "clamped_points")]
    pub points: u32,
    #[serde(rename = "taskace_preferences", default, deserialize_with = "null_as_default")]
    pub preferences: UserPreferences,
    #[serde(
        rename = "taskace_active_schedule",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub active_schedule: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Older stores could push the total below zero; load those as zero.
fn clamped_points<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let stored = Option::<i64>::deserialize(deserializer)?.unwrap_or_default();
    let points = u32::try_from(stored.max(0)).unwrap_or(u32::MAX);
    if i64::from(points) != stored {
        warn!(stored, loaded = points, "stored points total out of range, clamped");
    }
    Ok(points)
}

impl StateSnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse state snapshot")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize state snapshot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Category, Priority};
    use crate::preferences::DayPart;

    #[test]
    fn loads_stored_document_with_nulls_and_missing_keys() {
        let raw = r#"{
            "taskace_tasks": [{
                "id": "1718000000000",
                "title": "Lab report",
                "category": "Academic Tasks",
                "priority": "High",
                "deadline": "2026-06-12T23:59:00Z",
                "completed": true,
                "createdAt": "2026-06-10T08:00:00Z",
                "completedAt": "2026-06-11T09:30:00Z",
                "estimatedDuration": null,
                "deletedAt": null
            }],
            "taskace_points": null,
            "taskace_preferences": {
                "preferredStudyTime": "evening",
                "maxTasksPerDay": 3,
                "breakDuration": 10,
                "studySessionDuration": 30
            }
        }"#;

        let snap = StateSnapshot::from_json(raw).unwrap();
        assert_eq!(snap.tasks.len(), 1);
        let task = &snap.tasks[0];
        assert_eq!(task.category, Category::AcademicTasks);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.estimated_duration, None);
        assert!(!task.deleted);
        assert!(task.flags_consistent());

        assert_eq!(snap.points, 0);
        assert!(snap.schedules.is_empty());
        assert_eq!(snap.preferences.preferred_study_time, DayPart::Evening);
        assert_eq!(snap.active_schedule, None);
    }

    #[test]
    fn writes_storage_keys() {
        let json = StateSnapshot::default().to_json_pretty().unwrap();
        for key in ["taskace_tasks", "taskace_schedules", "taskace_points", "taskace_preferences"] {
            assert!(json.contains(key), "missing {key}");
        }
        assert!(!json.contains("taskace_active_schedule"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(StateSnapshot::from_json("{\"taskace_tasks\": 5}").is_err());
    }

    #[test]
    fn negative_points_total_loads_as_zero() {
        let snap = StateSnapshot::from_json(r#"{"taskace_points": -30}"#).unwrap();
        assert_eq!(snap.points, 0);
        assert!(snap.tasks.is_empty());

        let snap = StateSnapshot::from_json(r#"{"taskace_points": 8589934592}"#).unwrap();
        assert_eq!(snap.points, u32::MAX);
    }
}
