//! Session: the single writer over all engine state.
//!
//! Every mutating call runs the same three steps:
//! 1) fire lifecycle timers due at the current clock reading
//! 2) apply the caller's mutation
//! 3) drain store change feeds into the orchestrator (re-plan if anything changed)
//!
//! Timer effects and user actions are therefore strictly serialized. Read
//! calls that can observe timer effects (`task`, `todays_tasks`,
//! `assignments`, ...) settle timers first and so take `&mut self`.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineResult;
use crate::lifecycle::{LifecycleController, LifecycleEvent, LifecyclePolicy, Scoreboard};
use crate::notify::{ChangeObserver, StoreEvent};
use crate::orchestrator::{Orchestrator, PlanInputs, PlanUpdate};
use crate::packer::{Assignment, DEFAULT_HORIZON_DAYS};
use crate::preferences::{PreferenceStore, PreferencesPatch, UserPreferences};
use crate::snapshot::StateSnapshot;
use crate::task::{Task, TaskDraft, TaskPatch};
use crate::task_store::TaskStore;
use crate::templates::{ScheduleTemplate, TemplateDraft, TemplateStore};
use crate::time::local_day;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Zone used for calendar-day questions and the first day of the plan.
    pub timezone: Tz,
    pub horizon_days: u32,
    pub policy: LifecyclePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            horizon_days: DEFAULT_HORIZON_DAYS,
            policy: LifecyclePolicy::default(),
        }
    }
}

pub struct Session<C: Clock = SystemClock> {
    clock: C,
    config: SessionConfig,
    tasks: TaskStore,
    preferences: PreferenceStore,
    templates: TemplateStore,
    score: Scoreboard,
    lifecycle: LifecycleController,
    orchestrator: Orchestrator,
}

impl<C: Clock> Session<C> {
    /// Fresh state: no tasks, zero points, default preferences and templates.
    pub fn new(clock: C, config: SessionConfig) -> Self {
        let now = clock.now();
        let mut session = Self {
            lifecycle: LifecycleController::new(config.policy, now),
            orchestrator: Orchestrator::new(config.horizon_days),
            clock,
            config,
            tasks: TaskStore::new(),
            preferences: PreferenceStore::default(),
            templates: TemplateStore::with_defaults(),
            score: Scoreboard::default(),
        };
        session.replan(now, &[StoreEvent::RescheduleRequested]);
        session
    }

    /// Rebuild a session from persisted state.
    ///
    /// Tasks with a flag but no timestamp (or the reverse) are repaired.
    /// Undo and purge timers are re-armed from the stored timestamps.
    pub fn from_snapshot(clock: C, config: SessionConfig, snapshot: StateSnapshot) -> EngineResult<Self> {
        let now = clock.now();

        let mut tasks = TaskStore::new();
        for mut task in snapshot.tasks {
            if task.normalize(now) {
                warn!(task_id = %task.id, "repaired inconsistent lifecycle flags on load");
            }
            tasks.load(task);
        }

        let preferences = PreferenceStore::new(snapshot.preferences)?;
        let templates = if snapshot.schedules.is_empty() {
            TemplateStore::with_defaults()
        } else {
            TemplateStore::from_parts(snapshot.schedules, snapshot.active_schedule)?
        };

        let mut lifecycle = LifecycleController::new(config.policy, now);
        lifecycle.rearm(&tasks, now);

        let mut session = Self {
            orchestrator: Orchestrator::new(config.horizon_days),
            clock,
            config,
            tasks,
            preferences,
            templates,
            score: Scoreboard::new(snapshot.points),
            lifecycle,
        };
        session.replan(now, &[StoreEvent::RescheduleRequested]);
        info!(
            tasks = session.tasks.len(),
            points = session.score.points(),
            "session restored"
        );
        Ok(session)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tasks: self.tasks.iter().cloned().collect(),
            schedules: self.templates.list().to_vec(),
            points: self.score.points(),
            preferences: *self.preferences.get(),
            active_schedule: self.templates.active_id().map(str::to_string),
        }
    }

    /// Fire outstanding timers and hand back the final state.
    pub fn close(mut self) -> StateSnapshot {
        self.tick();
        info!(tasks = self.tasks.len(), "session closed");
        self.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlanUpdate> {
        self.orchestrator.subscribe()
    }

    /// Drive timers with no foreground action. Returns what fired.
    pub fn tick(&mut self) -> Vec<LifecycleEvent> {
        let (now, fired) = self.settle();
        self.commit(now);
        fired
    }

    /// Next instant a timer wants to fire.
    pub fn next_timer_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.timers().next_fire_at()
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> EngineResult<Task> {
        let (now, _) = self.settle();
        let added = self.tasks.add(draft, now).cloned();
        self.commit(now);
        let task = added?;
        info!(task_id = %task.id, title = %task.title, "task added");
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> EngineResult<Task> {
        let (now, _) = self.settle();
        let updated = self.tasks.update(id, patch).cloned();
        self.commit(now);
        updated
    }

    pub fn complete_task(&mut self, id: &str) -> EngineResult<Task> {
        let (now, _) = self.settle();
        let result = self
            .lifecycle
            .complete(&mut self.tasks, &mut self.score, id, now);
        self.commit(now);
        result?;
        self.tasks.require(id).cloned()
    }

    pub fn uncomplete_task(&mut self, id: &str) -> EngineResult<Task> {
        let (now, _) = self.settle();
        let result = self.lifecycle.uncomplete(&mut self.tasks, &mut self.score, id);
        self.commit(now);
        result?;
        self.tasks.require(id).cloned()
    }

    pub fn delete_task(&mut self, id: &str) -> EngineResult<()> {
        let (now, _) = self.settle();
        let result = self.lifecycle.delete(&mut self.tasks, id, now);
        self.commit(now);
        result
    }

    pub fn restore_task(&mut self, id: &str) -> EngineResult<Task> {
        let (now, _) = self.settle();
        let result = self.lifecycle.restore(&mut self.tasks, id);
        self.commit(now);
        result?;
        self.tasks.require(id).cloned()
    }

    /// Lookup by id. Soft-deleted tasks are still found until purged.
    pub fn task(&mut self, id: &str) -> EngineResult<&Task> {
        self.tick();
        self.tasks.require(id)
    }

    /// Every task in insertion order, soft-deleted ones included.
    pub fn tasks(&mut self) -> Vec<&Task> {
        self.tick();
        self.tasks.iter().collect()
    }

    pub fn todays_tasks(&mut self) -> Vec<&Task> {
        self.tick();
        self.tasks.todays_tasks(self.clock.now(), self.config.timezone)
    }

    /// Tasks completed on `date` (local calendar day).
    pub fn tasks_by_date(&mut self, date: NaiveDate) -> Vec<&Task> {
        self.tick();
        self.tasks
            .tasks_completed_on(date, self.clock.now(), self.config.timezone)
    }

    pub fn completed_tasks(&mut self) -> Vec<&Task> {
        self.tick();
        self.tasks.completed_tasks(self.clock.now(), self.config.timezone)
    }

    pub fn points(&self) -> u32 {
        self.score.points()
    }

    pub fn preferences(&self) -> &UserPreferences {
        self.preferences.get()
    }

    pub fn update_preferences(&mut self, patch: &PreferencesPatch) -> EngineResult<UserPreferences> {
        let (now, _) = self.settle();
        let updated = self.preferences.update(patch).copied();
        self.commit(now);
        updated
    }

    pub fn templates(&self) -> &[ScheduleTemplate] {
        self.templates.list()
    }

    pub fn active_template(&self) -> Option<&ScheduleTemplate> {
        self.templates.active()
    }

    pub fn add_template(&mut self, draft: TemplateDraft) -> EngineResult<ScheduleTemplate> {
        let (now, _) = self.settle();
        let added = self.templates.add(draft).cloned();
        self.commit(now);
        let template = added?;
        info!(template_id = %template.id, name = %template.name, "template added");
        Ok(template)
    }

    pub fn set_active_template(&mut self, id: &str) -> EngineResult<ScheduleTemplate> {
        let (now, _) = self.settle();
        let switched = self.templates.set_active(id).cloned();
        self.commit(now);
        let template = switched?;
        info!(template_id = %template.id, name = %template.name, "active template switched");
        Ok(template)
    }

    /// Current plan, after settling timers.
    pub fn assignments(&mut self) -> &[Assignment] {
        self.tick();
        self.orchestrator.assignments()
    }

    /// Re-plan on demand even when nothing changed.
    pub fn reschedule(&mut self) -> &[Assignment] {
        let (now, _) = self.settle();
        self.commit(now);
        self.replan(now, &[StoreEvent::RescheduleRequested]);
        self.orchestrator.assignments()
    }

    fn settle(&mut self) -> (DateTime<Utc>, Vec<LifecycleEvent>) {
        let now = self.clock.now();
        let fired = self.lifecycle.advance(&mut self.tasks, now);
        (now, fired)
    }

    /// Hand pending store events to the orchestrator.
    fn commit(&mut self, now: DateTime<Utc>) {
        let mut events = self.tasks.take_changes();
        events.extend(self.preferences.take_changes());
        events.extend(self.templates.take_changes());

        let inputs = PlanInputs {
            tasks: &self.tasks,
            preferences: self.preferences.get(),
            template: self.templates.active(),
            now,
            start: local_day(now, self.config.timezone),
        };
        self.orchestrator.on_change(&events, &inputs);
    }

    fn replan(&mut self, now: DateTime<Utc>, changes: &[StoreEvent]) {
        let inputs = PlanInputs {
            tasks: &self.tasks,
            preferences: self.preferences.get(),
            template: self.templates.active(),
            now,
            start: local_day(now, self.config.timezone),
        };
        self.orchestrator.replan(&inputs, changes);
    }
}
