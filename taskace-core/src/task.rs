//! Task model for the scheduling and lifecycle engine.
//!
//! Field names serialize in camelCase to match the persisted state layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// Upper bound for any duration in minutes: one day.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Fixed task classification used for scoring and slot eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Education,
    Personal,
    Household,
    AcademicTasks,
    PersonalDevelopment,
    DailyResponsibilities,
    LifeManagement,
    Rewards,
    Breaks,
    /// Anything not in the fixed set (only reachable through stored data).
    /// Keeps the stored label so it is written back unchanged.
    Uncategorized(String),
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Education,
        Category::Personal,
        Category::Household,
        Category::AcademicTasks,
        Category::PersonalDevelopment,
        Category::DailyResponsibilities,
        Category::LifeManagement,
        Category::Rewards,
        Category::Breaks,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Education => "Education",
            Category::Personal => "Personal",
            Category::Household => "Household",
            Category::AcademicTasks => "Academic Tasks",
            Category::PersonalDevelopment => "Personal Development",
            Category::DailyResponsibilities => "Daily Responsibilities",
            Category::LifeManagement => "Life Management",
            Category::Rewards => "Rewards",
            Category::Breaks => "Breaks",
            Category::Uncategorized(label) => label,
        }
    }

    /// Education and Academic Tasks: kept out of late-night slots, minimum 45 minutes.
    pub fn is_study(&self) -> bool {
        matches!(self, Category::Education | Category::AcademicTasks)
    }

    /// Breaks and Rewards: only fit short slots.
    pub fn is_break_or_reward(&self) -> bool {
        matches!(self, Category::Breaks | Category::Rewards)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Category::Uncategorized(s))
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        match c {
            Category::Uncategorized(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Category {
    type Err = EngineError;

    /// Case-insensitive; spaces, dashes and underscores are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();

        Category::ALL
            .into_iter()
            .find(|c| c.as_str().replace(' ', "").to_lowercase() == norm)
            .ok_or_else(|| EngineError::invalid("category", format!("unknown category '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("High"),
            Priority::Medium => f.write_str("Medium"),
            Priority::Low => f.write_str("Low"),
        }
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            _ => Err(EngineError::invalid("priority", format!("unknown priority '{s}'"))),
        }
    }
}

/// Where a task sits in its lifecycle. `Purged` tasks are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Active,
    Completed,
    SoftDeleted,
}

/// Core task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_worked_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn state(&self) -> TaskState {
        if self.deleted {
            TaskState::SoftDeleted
        } else if self.completed {
            TaskState::Completed
        } else {
            TaskState::Active
        }
    }

    /// `completed` iff `completed_at`, `deleted` iff `deleted_at`.
    pub fn flags_consistent(&self) -> bool {
        self.completed == self.completed_at.is_some() && self.deleted == self.deleted_at.is_some()
    }

    /// Repair flag/timestamp mismatches from stored data. Returns true if anything changed.
    pub(crate) fn normalize(&mut self, now: DateTime<Utc>) -> bool {
        let before = (self.completed_at, self.deleted_at);
        match (self.completed, self.completed_at) {
            (true, None) => self.completed_at = Some(now),
            (false, Some(_)) => self.completed_at = None,
            _ => {}
        }
        match (self.deleted, self.deleted_at) {
            (true, None) => self.deleted_at = Some(now),
            (false, Some(_)) => self.deleted_at = None,
            _ => {}
        }
        before != (self.completed_at, self.deleted_at)
    }
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub last_worked_on: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(
        title: impl Into<String>,
        category: Category,
        priority: Priority,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category,
            priority,
            deadline,
            estimated_duration: None,
            last_worked_on: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration = Some(minutes);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_title(&self.title)?;
        validate_estimate(self.estimated_duration)
    }

    pub(crate) fn into_task(self, id: String, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            priority: self.priority,
            deadline: self.deadline,
            completed: false,
            created_at: now,
            completed_at: None,
            estimated_duration: self.estimated_duration,
            last_worked_on: self.last_worked_on,
            deleted: false,
            deleted_at: None,
        }
    }
}

/// Partial update. `None` leaves a field untouched; lifecycle flags are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub deadline: Option<DateTime<Utc>>,
    /// `Some(None)` clears the estimate.
    pub estimated_duration: Option<Option<u32>>,
    pub last_worked_on: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(estimate) = self.estimated_duration {
            validate_estimate(estimate)?;
        }
        Ok(())
    }

    pub(crate) fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(estimate) = self.estimated_duration {
            task.estimated_duration = estimate;
        }
        if let Some(at) = self.last_worked_on {
            task.last_worked_on = Some(at);
        }
    }
}

fn validate_title(title: &str) -> EngineResult<()> {
    if title.trim().is_empty() {
        return Err(EngineError::invalid("title", "must not be empty"));
    }
    Ok(())
}

fn validate_estimate(estimate: Option<u32>) -> EngineResult<()> {
    match estimate {
        Some(0) => Err(EngineError::invalid(
            "estimatedDuration",
            "must be a positive number of minutes",
        )),
        Some(m) if m > MAX_DURATION_MINUTES => Err(EngineError::invalid(
            "estimatedDuration",
            format!("must be at most {MAX_DURATION_MINUTES} minutes"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap()
    }

    #[test]
    fn category_parses_loosely_and_serializes_display_name() {
        assert_eq!("academic tasks".parse::<Category>().unwrap(), Category::AcademicTasks);
        assert_eq!("Daily-Responsibilities".parse::<Category>().unwrap(), Category::DailyResponsibilities);
        assert_eq!("BREAKS".parse::<Category>().unwrap(), Category::Breaks);
        assert!("gardening".parse::<Category>().is_err());

        assert_eq!(serde_json::to_string(&Category::LifeManagement).unwrap(), "\"Life Management\"");
        let unknown: Category = serde_json::from_str("\"Gardening\"").unwrap();
        assert_eq!(unknown, Category::Uncategorized("Gardening".into()));
        assert!(!unknown.is_study() && !unknown.is_break_or_reward());
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"Gardening\"");
    }

    #[test]
    fn draft_validation_rejects_blank_title_and_out_of_range_estimate() {
        let d = TaskDraft::new("  ", Category::Personal, Priority::Low, at(9));
        assert_eq!(
            d.validate(),
            Err(EngineError::invalid("title", "must not be empty"))
        );

        let d = TaskDraft::new("Read", Category::Personal, Priority::Low, at(9)).with_duration(0);
        assert!(matches!(
            d.validate(),
            Err(EngineError::ValidationFailed { field: "estimatedDuration", .. })
        ));

        let d = TaskDraft::new("Read", Category::Personal, Priority::Low, at(9))
            .with_duration(MAX_DURATION_MINUTES + 1);
        assert!(matches!(
            d.validate(),
            Err(EngineError::ValidationFailed { field: "estimatedDuration", .. })
        ));
        let d = TaskDraft::new("Read", Category::Personal, Priority::Low, at(9))
            .with_duration(MAX_DURATION_MINUTES);
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut t = TaskDraft::new("Essay", Category::Education, Priority::Medium, at(9))
            .with_duration(60)
            .into_task("t1".into(), at(8));

        TaskPatch {
            priority: Some(Priority::High),
            estimated_duration: Some(None),
            ..Default::default()
        }
        .apply(&mut t);

        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.estimated_duration, None);
        assert_eq!(t.title, "Essay");
        assert_eq!(t.created_at, at(8));
    }

    #[test]
    fn normalize_repairs_flag_mismatches() {
        let mut t = TaskDraft::new("x", Category::Personal, Priority::Low, at(9))
            .into_task("t1".into(), at(8));
        t.completed = true;
        t.deleted_at = Some(at(7));
        assert!(!t.flags_consistent());

        assert!(t.normalize(at(10)));
        assert_eq!(t.completed_at, Some(at(10)));
        assert_eq!(t.deleted_at, None);
        assert!(t.flags_consistent());
        assert!(!t.normalize(at(11)));
    }

    #[test]
    fn missing_optional_fields_deserialize_as_absent() {
        let json = r#"{
            "id": "1",
            "title": "Design Homepage",
            "category": "Education",
            "priority": "High",
            "deadline": "2025-11-23T00:00:00Z",
            "completed": false,
            "createdAt": "2025-11-01T10:00:00Z",
            "completedAt": null
        }"#;
        let t: Task = serde_json::from_str(json).unwrap();
        assert_eq!(t.completed_at, None);
        assert_eq!(t.deleted_at, None);
        assert!(!t.deleted);
        assert_eq!(t.state(), TaskState::Active);
        assert!(t.flags_consistent());
    }
}
