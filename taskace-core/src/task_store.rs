//! TaskStore: canonical task records plus an insertion-order index.
//!
//! - Canonical Task copies live in a map (id -> Task).
//! - `order` keeps ids in insertion order. Iteration, queries and the
//!   ranker's tie-break all follow it, so results stay deterministic.
//! - Every mutation queues a [`StoreEvent`].
//!
//! Lifecycle mutators (`mark_*`, `purge`) are crate-private: only the
//! lifecycle controller moves tasks between states, and each mutator sets
//! the flag and its timestamp together.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::notify::{ChangeFeed, StoreEvent};
use crate::task::{Task, TaskDraft, TaskPatch};
use crate::time::{local_day, months_before};

/// Completed tasks older than this are hidden from history queries.
pub const HISTORY_MONTHS: u32 = 2;

#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    changes: ChangeFeed,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn require(&self, id: &str) -> EngineResult<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| EngineError::task_not_found(id))
    }

    /// All tasks, soft-deleted ones included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Tasks that take part in planning: neither completed nor soft-deleted.
    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.iter().filter(|t| !t.completed && !t.deleted)
    }

    pub fn add(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> EngineResult<&Task> {
        draft.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let task = draft.into_task(id.clone(), now);
        self.order.push(id.clone());
        self.tasks.insert(id.clone(), task);
        self.changes.emit(StoreEvent::TaskAdded(id.clone()));
        self.require(&id)
    }

    /// Insert a previously persisted task as-is (no event). Replaces a task with the same id.
    pub(crate) fn load(&mut self, task: Task) {
        if !self.tasks.contains_key(&task.id) {
            self.order.push(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn update(&mut self, id: &str, patch: TaskPatch) -> EngineResult<&Task> {
        patch.validate()?;
        let task = self.require_visible_mut(id)?;
        patch.apply(task);
        self.changes.emit(StoreEvent::TaskUpdated(id.to_string()));
        self.require(id)
    }

    pub(crate) fn mark_completed(&mut self, id: &str, at: DateTime<Utc>) -> EngineResult<()> {
        let task = self.require_visible_mut(id)?;
        if task.completed {
            return Err(EngineError::invalid("completed", format!("task {id} is already completed")));
        }
        task.completed = true;
        task.completed_at = Some(at);
        self.changes.emit(StoreEvent::TaskCompleted(id.to_string()));
        Ok(())
    }

    pub(crate) fn mark_reopened(&mut self, id: &str) -> EngineResult<()> {
        let task = self.require_visible_mut(id)?;
        if !task.completed {
            return Err(EngineError::invalid("completed", format!("task {id} is not completed")));
        }
        task.completed = false;
        task.completed_at = None;
        self.changes.emit(StoreEvent::TaskReopened(id.to_string()));
        Ok(())
    }

    pub(crate) fn mark_deleted(&mut self, id: &str, at: DateTime<Utc>) -> EngineResult<()> {
        let task = self.require_visible_mut(id)?;
        task.deleted = true;
        task.deleted_at = Some(at);
        self.changes.emit(StoreEvent::TaskDeleted(id.to_string()));
        Ok(())
    }

    pub(crate) fn mark_restored(&mut self, id: &str) -> EngineResult<()> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::task_not_found(id))?;
        if !task.deleted {
            return Err(EngineError::invalid("deleted", format!("task {id} is not deleted")));
        }
        task.deleted = false;
        task.deleted_at = None;
        self.changes.emit(StoreEvent::TaskRestored(id.to_string()));
        Ok(())
    }

    /// Permanently remove a task.
    pub(crate) fn purge(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        self.order.retain(|o| o != id);
        self.changes.emit(StoreEvent::TaskPurged(id.to_string()));
        Some(task)
    }

    /// Ids of completed tasks whose completion is strictly before `cutoff`.
    pub fn completed_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.iter()
            .filter(|t| t.completed && t.completed_at.is_some_and(|at| at < cutoff))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Non-deleted tasks whose deadline falls on today's local calendar day.
    pub fn todays_tasks(&self, now: DateTime<Utc>, tz: Tz) -> Vec<&Task> {
        let today = local_day(now, tz);
        self.iter()
            .filter(|t| !t.deleted && local_day(t.deadline, tz) == today)
            .collect()
    }

    /// Non-deleted tasks completed on `date` (local), within the history window.
    pub fn tasks_completed_on(&self, date: NaiveDate, now: DateTime<Utc>, tz: Tz) -> Vec<&Task> {
        let floor = months_before(now, HISTORY_MONTHS, tz);
        self.iter()
            .filter(|t| !t.deleted)
            .filter(|t| {
                t.completed_at
                    .is_some_and(|at| at >= floor && local_day(at, tz) == date)
            })
            .collect()
    }

    /// Completed, non-deleted tasks within the history window.
    pub fn completed_tasks(&self, now: DateTime<Utc>, tz: Tz) -> Vec<&Task> {
        let floor = months_before(now, HISTORY_MONTHS, tz);
        self.iter()
            .filter(|t| t.completed && !t.deleted)
            .filter(|t| t.completed_at.is_some_and(|at| at >= floor))
            .collect()
    }

    pub fn take_changes(&mut self) -> Vec<StoreEvent> {
        self.changes.drain()
    }

    /// Soft-deleted tasks only accept `restore`.
    fn require_visible_mut(&mut self, id: &str) -> EngineResult<&mut Task> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::task_not_found(id))?;
        if task.deleted {
            return Err(EngineError::invalid(
                "deleted",
                format!("task {id} is pending deletion; restore it first"),
            ));
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Category, Priority};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
    }

    fn utc() -> Tz {
        "UTC".parse().unwrap()
    }

    fn draft(title: &str, deadline: DateTime<Utc>) -> TaskDraft {
        TaskDraft::new(title, Category::Personal, Priority::Medium, deadline)
    }

    #[test]
    fn add_assigns_unique_ids_and_keeps_insertion_order() {
        let mut s = TaskStore::new();
        let a = s.add(draft("a", now()), now()).unwrap().id.clone();
        let b = s.add(draft("b", now()), now()).unwrap().id.clone();
        assert_ne!(a, b);

        let titles: Vec<_> = s.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(s.get(&a).unwrap().created_at, now());
        assert!(!s.get(&a).unwrap().completed);

        let events = s.take_changes();
        assert_eq!(events, vec![StoreEvent::TaskAdded(a), StoreEvent::TaskAdded(b)]);
    }

    #[test]
    fn mutators_keep_flags_and_timestamps_together() {
        let mut s = TaskStore::new();
        let id = s.add(draft("a", now()), now()).unwrap().id.clone();

        s.mark_completed(&id, now()).unwrap();
        assert!(s.get(&id).unwrap().flags_consistent());
        assert!(s.mark_completed(&id, now()).is_err());

        s.mark_reopened(&id).unwrap();
        assert!(s.get(&id).unwrap().flags_consistent());
        assert!(s.mark_reopened(&id).is_err());

        s.mark_deleted(&id, now()).unwrap();
        let t = s.get(&id).unwrap();
        assert!(t.deleted && t.deleted_at == Some(now()));

        // Pending deletion blocks everything except restore.
        assert!(matches!(
            s.update(&id, TaskPatch { title: Some("b".into()), ..Default::default() }),
            Err(EngineError::ValidationFailed { field: "deleted", .. })
        ));
        s.mark_restored(&id).unwrap();
        assert!(s.get(&id).unwrap().flags_consistent());
    }

    #[test]
    fn purge_makes_the_task_unreachable() {
        let mut s = TaskStore::new();
        let id = s.add(draft("a", now()), now()).unwrap().id.clone();
        assert!(s.purge(&id).is_some());
        assert!(s.get(&id).is_none());
        assert_eq!(s.iter().count(), 0);
        assert_eq!(
            s.update(&id, TaskPatch::default()).unwrap_err(),
            EngineError::task_not_found(id.clone())
        );
        assert!(s.purge(&id).is_none());
    }

    #[test]
    fn queries_filter_by_local_day_and_history_window() {
        let mut s = TaskStore::new();
        let today = s.add(draft("today", now() + Duration::hours(2)), now()).unwrap().id.clone();
        let tomorrow = s.add(draft("tomorrow", now() + Duration::days(1)), now()).unwrap().id.clone();
        let old = s.add(draft("old", now()), now()).unwrap().id.clone();
        let hidden = s.add(draft("hidden", now()), now()).unwrap().id.clone();

        s.mark_completed(&tomorrow, now() - Duration::days(1)).unwrap();
        s.mark_completed(&old, now() - Duration::days(70)).unwrap();
        s.mark_deleted(&hidden, now()).unwrap();

        let todays: Vec<_> = s.todays_tasks(now(), utc()).iter().map(|t| t.id.clone()).collect();
        assert_eq!(todays, vec![today.clone(), old.clone()]);

        let completed: Vec<_> = s.completed_tasks(now(), utc()).iter().map(|t| t.id.clone()).collect();
        assert_eq!(completed, vec![tomorrow.clone()]);

        let yesterday = (now() - Duration::days(1)).date_naive();
        let by_date: Vec<_> = s
            .tasks_completed_on(yesterday, now(), utc())
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(by_date, vec![tomorrow]);

        let seventy = (now() - Duration::days(70)).date_naive();
        assert!(s.tasks_completed_on(seventy, now(), utc()).is_empty());

        assert_eq!(s.pending().count(), 1);
    }
}
