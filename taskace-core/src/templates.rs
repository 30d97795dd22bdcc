//! Daily schedule templates: named, ordered lists of labeled time windows.
//! Exactly one template is active whenever the store is non-empty.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::notify::{ChangeFeed, StoreEvent};
use crate::time::TimeOfDay;

/// Activity labels that mark a window as usable for task placement.
pub const PLANNABLE_LABELS: [&str; 2] = ["Free Time", "Work/Study"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: String,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub activity: String,
}

impl ScheduleItem {
    pub fn duration_minutes(&self) -> u32 {
        self.end_time.minutes().saturating_sub(self.start_time.minutes())
    }

    /// Free Time and Work/Study windows take tasks; meals, routines etc. do not.
    pub fn is_plannable(&self) -> bool {
        PLANNABLE_LABELS.iter().any(|l| self.activity.contains(l))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.start_time >= self.end_time {
            return Err(EngineError::invalid(
                "scheduleItems",
                format!(
                    "item {} ends at {} which is not after its start {}",
                    self.id, self.end_time, self.start_time
                ),
            ));
        }
        if self.activity.trim().is_empty() {
            return Err(EngineError::invalid(
                "scheduleItems",
                format!("item {} has an empty activity", self.id),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTemplate {
    pub id: String,
    pub name: String,
    pub schedule_items: Vec<ScheduleItem>,
}

impl ScheduleTemplate {
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::invalid("name", "template name must not be empty"));
        }
        self.schedule_items.iter().try_for_each(ScheduleItem::validate)
    }

    pub fn plannable_slots(&self) -> impl Iterator<Item = &ScheduleItem> {
        self.schedule_items.iter().filter(|i| i.is_plannable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItemDraft {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub activity: String,
}

impl ScheduleItemDraft {
    pub fn new(start_time: TimeOfDay, end_time: TimeOfDay, activity: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            activity: activity.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    pub name: String,
    pub schedule_items: Vec<ScheduleItemDraft>,
}

impl TemplateDraft {
    fn into_template(self, id: String) -> ScheduleTemplate {
        ScheduleTemplate {
            id,
            name: self.name.trim().to_string(),
            schedule_items: self
                .schedule_items
                .into_iter()
                .enumerate()
                .map(|(i, d)| ScheduleItem {
                    id: (i + 1).to_string(),
                    start_time: d.start_time,
                    end_time: d.end_time,
                    activity: d.activity.trim().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: Vec<ScheduleTemplate>,
    active: Option<String>,
    changes: ChangeFeed,
}

impl TemplateStore {
    /// "Working Day" (active) and "Holiday".
    pub fn with_defaults() -> Self {
        let templates = default_templates();
        let active = templates.first().map(|t| t.id.clone());
        Self {
            templates,
            active,
            changes: ChangeFeed::default(),
        }
    }

    /// Rebuild from persisted templates. An unknown or missing active id falls back to the first.
    pub fn from_parts(templates: Vec<ScheduleTemplate>, active: Option<String>) -> EngineResult<Self> {
        templates.iter().try_for_each(ScheduleTemplate::validate)?;
        let active = active
            .filter(|id| templates.iter().any(|t| &t.id == id))
            .or_else(|| templates.first().map(|t| t.id.clone()));
        Ok(Self {
            templates,
            active,
            changes: ChangeFeed::default(),
        })
    }

    pub fn list(&self) -> &[ScheduleTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&ScheduleTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn active(&self) -> Option<&ScheduleTemplate> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Add a template; the first template added to an empty store becomes active.
    pub fn add(&mut self, draft: TemplateDraft) -> EngineResult<&ScheduleTemplate> {
        let id = uuid::Uuid::new_v4().to_string();
        let template = draft.into_template(id.clone());
        template.validate()?;

        self.templates.push(template);
        self.changes.emit(StoreEvent::TemplateAdded(id.clone()));
        if self.active.is_none() {
            self.active = Some(id.clone());
            self.changes.emit(StoreEvent::ActiveTemplateChanged(id.clone()));
        }
        self.get(&id).ok_or_else(|| EngineError::template_not_found(id))
    }

    pub fn set_active(&mut self, id: &str) -> EngineResult<&ScheduleTemplate> {
        if self.get(id).is_none() {
            return Err(EngineError::template_not_found(id));
        }
        self.active = Some(id.to_string());
        self.changes.emit(StoreEvent::ActiveTemplateChanged(id.to_string()));
        self.get(id).ok_or_else(|| EngineError::template_not_found(id))
    }

    pub fn take_changes(&mut self) -> Vec<StoreEvent> {
        self.changes.drain()
    }
}

fn item(id: &str, start: (u32, u32), end: (u32, u32), activity: &str) -> Option<ScheduleItem> {
    Some(ScheduleItem {
        id: id.to_string(),
        start_time: TimeOfDay::new(start.0, start.1)?,
        end_time: TimeOfDay::new(end.0, end.1)?,
        activity: activity.to_string(),
    })
}

fn default_templates() -> Vec<ScheduleTemplate> {
    let working_day = [
        item("1", (8, 0), (9, 30), "Morning Routine"),
        item("2", (9, 30), (12, 0), "Work/Study"),
        item("3", (12, 0), (13, 0), "Lunch Break"),
        item("4", (13, 0), (17, 0), "Work/Study"),
        item("5", (17, 0), (18, 0), "Exercise"),
        item("6", (18, 0), (19, 0), "Dinner"),
        item("7", (19, 0), (22, 0), "Free Time"),
    ];
    let holiday = [
        item("1", (9, 0), (10, 0), "Morning Routine"),
        item("2", (10, 0), (12, 0), "Free Time"),
        item("3", (12, 0), (13, 0), "Lunch"),
        item("4", (13, 0), (18, 0), "Free Time"),
        item("5", (18, 0), (19, 0), "Dinner"),
        item("6", (19, 0), (23, 0), "Free Time"),
    ];

    vec![
        ScheduleTemplate {
            id: "1".to_string(),
            name: "Working Day".to_string(),
            schedule_items: working_day.into_iter().flatten().collect(),
        },
        ScheduleTemplate {
            id: "2".to_string(),
            name: "Holiday".to_string(),
            schedule_items: holiday.into_iter().flatten().collect(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    #[test]
    fn defaults_seed_two_templates_with_working_day_active() {
        let store = TemplateStore::with_defaults();
        assert_eq!(store.list().len(), 2);
        let active = store.active().unwrap();
        assert_eq!(active.name, "Working Day");
        assert_eq!(active.schedule_items.len(), 7);
        assert_eq!(active.plannable_slots().count(), 3);
        assert!(store.list().iter().all(|t| t.validate().is_ok()));
    }

    #[test]
    fn add_rejects_inverted_item_and_numbers_items() {
        let mut store = TemplateStore::with_defaults();
        let bad = TemplateDraft {
            name: "Night shift".into(),
            schedule_items: vec![ScheduleItemDraft::new(t("23:00"), t("01:00"), "Work/Study")],
        };
        assert!(matches!(
            store.add(bad),
            Err(EngineError::ValidationFailed { field: "scheduleItems", .. })
        ));
        assert_eq!(store.list().len(), 2);

        let good = TemplateDraft {
            name: "Exam week".into(),
            schedule_items: vec![
                ScheduleItemDraft::new(t("08:00"), t("12:00"), "Work/Study"),
                ScheduleItemDraft::new(t("12:00"), t("12:30"), "Lunch"),
            ],
        };
        let added = store.add(good).unwrap();
        let ids: Vec<_> = added.schedule_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        // Adding does not switch the active template.
        assert_eq!(store.active().unwrap().name, "Working Day");
    }

    #[test]
    fn set_active_switches_or_reports_not_found() {
        let mut store = TemplateStore::with_defaults();
        store.take_changes();

        assert_eq!(store.set_active("2").unwrap().name, "Holiday");
        assert_eq!(store.active_id(), Some("2"));
        assert_eq!(
            store.take_changes(),
            vec![StoreEvent::ActiveTemplateChanged("2".into())]
        );

        assert_eq!(
            store.set_active("nope").unwrap_err(),
            EngineError::template_not_found("nope")
        );
        assert_eq!(store.active_id(), Some("2"));
    }

    #[test]
    fn from_parts_falls_back_to_first_template() {
        let templates = TemplateStore::with_defaults().list().to_vec();
        let store = TemplateStore::from_parts(templates.clone(), Some("missing".into())).unwrap();
        assert_eq!(store.active_id(), Some("1"));

        let empty = TemplateStore::from_parts(vec![], None).unwrap();
        assert!(empty.active().is_none());
    }

    #[test]
    fn first_template_in_empty_store_becomes_active() {
        let mut store = TemplateStore::from_parts(vec![], None).unwrap();
        let id = store
            .add(TemplateDraft {
                name: "Solo".into(),
                schedule_items: vec![ScheduleItemDraft::new(t("09:00"), t("10:00"), "Free Time")],
            })
            .unwrap()
            .id
            .clone();
        assert_eq!(store.active_id(), Some(id.as_str()));
    }
}
