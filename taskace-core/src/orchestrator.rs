//! Scheduling orchestrator: owns the current assignment list and rebuilds it
//! (rank, then pack) whenever a batch of store changes arrives.
//!
//! The list is replaced wholesale on every re-plan. Subscribers get a
//! [`PlanUpdate`] notice over a broadcast channel; lagging or absent
//! receivers never block planning.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::notify::{ChangeObserver, StoreEvent};
use crate::packer::{pack, Assignment, DEFAULT_HORIZON_DAYS};
use crate::preferences::UserPreferences;
use crate::ranker::rank;
use crate::task_store::TaskStore;
use crate::templates::ScheduleTemplate;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Everything a re-plan reads.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub tasks: &'a TaskStore,
    pub preferences: &'a UserPreferences,
    pub template: Option<&'a ScheduleTemplate>,
    pub now: DateTime<Utc>,
    /// First local day of the horizon.
    pub start: NaiveDate,
}

/// Notice sent to subscribers after each re-plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanUpdate {
    pub revision: u64,
    pub assignments: usize,
    pub changes: Vec<StoreEvent>,
}

#[derive(Debug)]
pub struct Orchestrator {
    assignments: Vec<Assignment>,
    horizon_days: u32,
    revision: u64,
    updates: broadcast::Sender<PlanUpdate>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZON_DAYS)
    }
}

impl Orchestrator {
    pub fn new(horizon_days: u32) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            assignments: Vec::new(),
            horizon_days,
            revision: 0,
            updates,
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Number of re-plans so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlanUpdate> {
        self.updates.subscribe()
    }

    /// Rank pending tasks and pack them into the active template.
    /// With no active template the plan is empty.
    pub fn replan(&mut self, inputs: &PlanInputs<'_>, changes: &[StoreEvent]) -> &[Assignment] {
        self.assignments = match inputs.template {
            Some(template) => {
                let ranked = rank(inputs.tasks.pending(), inputs.now);
                pack(&ranked, template, inputs.preferences, inputs.start, self.horizon_days)
            }
            None => Vec::new(),
        };
        self.revision += 1;
        debug!(
            revision = self.revision,
            assignments = self.assignments.len(),
            changes = changes.len(),
            "plan recomputed"
        );

        // Err only means nobody is listening.
        let _ = self.updates.send(PlanUpdate {
            revision: self.revision,
            assignments: self.assignments.len(),
            changes: changes.to_vec(),
        });
        &self.assignments
    }
}

impl<'a> ChangeObserver<PlanInputs<'a>> for Orchestrator {
    fn on_change(&mut self, events: &[StoreEvent], inputs: &PlanInputs<'a>) {
        if events.is_empty() {
            return;
        }
        self.replan(inputs, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Category, Priority, TaskDraft};
    use crate::templates::TemplateStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn replans_only_for_non_empty_batches_and_notifies_subscribers() {
        let templates = TemplateStore::with_defaults();
        let prefs = UserPreferences::default();
        let mut store = TaskStore::new();
        store
            .add(
                TaskDraft::new("read", Category::Education, Priority::Medium, now() + Duration::days(1)),
                now(),
            )
            .unwrap();
        let events = store.take_changes();

        let mut orch = Orchestrator::default();
        let mut rx = orch.subscribe();
        let inputs = PlanInputs {
            tasks: &store,
            preferences: &prefs,
            template: templates.active(),
            now: now(),
            start: now().date_naive(),
        };

        orch.on_change(&[], &inputs);
        assert_eq!(orch.revision(), 0);
        assert!(rx.try_recv().is_err());

        orch.on_change(&events, &inputs);
        assert_eq!(orch.revision(), 1);
        assert_eq!(orch.assignments().len(), 1);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.revision, 1);
        assert_eq!(update.assignments, 1);
        assert_eq!(update.changes, events);
    }

    #[test]
    fn no_active_template_means_empty_plan() {
        let store = TaskStore::new();
        let prefs = UserPreferences::default();
        let mut orch = Orchestrator::new(3);
        let inputs = PlanInputs {
            tasks: &store,
            preferences: &prefs,
            template: None,
            now: now(),
            start: now().date_naive(),
        };
        assert!(orch.replan(&inputs, &[StoreEvent::RescheduleRequested]).is_empty());
        assert_eq!(orch.horizon_days(), 3);
    }
}
