//! Lifecycle controller: completion and deletion with timed undo windows,
//! plus the periodic sweep of stale completed tasks.
//!
//! Each task moves through:
//! - Active -> Completed -> Active (uncomplete while the undo window is open)
//! - Active|Completed -> SoftDeleted -> back (restore while the window is open)
//! - SoftDeleted -> Purged when the purge timer fires
//! - Completed -> Purged by the sweep once older than `stale_after`
//!
//! Windows are tracked as timers, so "is the window open" is "is the timer
//! still armed". A timer fires at any reading `>=` its deadline. Deletion
//! purges at exactly `t + window`. Completion undo counts whole elapsed
//! seconds, so it stays open until `t + window + 1s`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult, UndoWindow};
use crate::task_store::TaskStore;
use crate::timers::TimerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub undo_window: Duration,
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    pub completion_reward: u32,
}

impl LifecyclePolicy {
    /// First instant at which a completion stamped `completed_at` can no longer
    /// be undone: undo is allowed while the whole seconds elapsed are at most
    /// `undo_window`.
    pub fn completion_undo_closes(&self, completed_at: DateTime<Utc>) -> DateTime<Utc> {
        completed_at + self.undo_window + Duration::seconds(1)
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            undo_window: Duration::seconds(30),
            stale_after: Duration::hours(24),
            sweep_interval: Duration::hours(1),
            completion_reward: 10,
        }
    }
}

/// Timer keys. The variant says what happens when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleTimer {
    /// Closes the completion undo window.
    UndoExpiry(String),
    /// Hard-removes a soft-deleted task.
    Purge(String),
    /// Periodic removal of stale completed tasks.
    Sweep,
}

/// What a timer firing did, for callers that report background activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    UndoWindowClosed { id: String },
    Purged { id: String },
    Swept { removed: Vec<String> },
}

/// Running points total. Never drops below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    points: u32,
}

impl Scoreboard {
    pub fn new(points: u32) -> Self {
        Self { points }
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn award(&mut self, n: u32) {
        self.points = self.points.saturating_add(n);
    }

    pub fn revoke(&mut self, n: u32) {
        self.points = self.points.saturating_sub(n);
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleController {
    policy: LifecyclePolicy,
    timers: TimerService<LifecycleTimer>,
}

impl LifecycleController {
    /// A controller with the first sweep one interval after `now`.
    pub fn new(policy: LifecyclePolicy, now: DateTime<Utc>) -> Self {
        let mut timers = TimerService::new();
        timers.schedule_at(LifecycleTimer::Sweep, now + policy.sweep_interval);
        Self { policy, timers }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn timers(&self) -> &TimerService<LifecycleTimer> {
        &self.timers
    }

    /// Re-arm timers for tasks loaded from storage.
    ///
    /// Undo windows still open at `now` get their remaining time back; every
    /// soft-deleted task gets its purge timer (already elapsed ones fire on
    /// the next `advance`). The sweep runs at `now` so stale completions from
    /// while the process was down go straight away.
    pub fn rearm(&mut self, store: &TaskStore, now: DateTime<Utc>) {
        for task in store.iter() {
            if let Some(at) = task.completed_at {
                let closes = self.policy.completion_undo_closes(at);
                if closes > now {
                    self.timers
                        .schedule_at(LifecycleTimer::UndoExpiry(task.id.clone()), closes);
                }
            }
            if let Some(at) = task.deleted_at {
                self.timers.schedule_at(
                    LifecycleTimer::Purge(task.id.clone()),
                    at + self.policy.undo_window,
                );
            }
        }
        self.timers.schedule_at(LifecycleTimer::Sweep, now);
        debug!(armed = self.timers.len(), "lifecycle timers re-armed");
    }

    /// Fire every timer due at `now`, earliest first.
    pub fn advance(&mut self, store: &mut TaskStore, now: DateTime<Utc>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for (key, fire_at) in self.timers.pop_due(now) {
            match key {
                LifecycleTimer::UndoExpiry(id) => {
                    debug!(task_id = %id, "completion undo window closed");
                    events.push(LifecycleEvent::UndoWindowClosed { id });
                }
                LifecycleTimer::Purge(id) => {
                    if store.purge(&id).is_some() {
                        self.timers.cancel(&LifecycleTimer::UndoExpiry(id.clone()));
                        info!(task_id = %id, "soft-deleted task purged");
                        events.push(LifecycleEvent::Purged { id });
                    }
                }
                LifecycleTimer::Sweep => {
                    let removed = self.sweep_stale(store, now);
                    if !removed.is_empty() {
                        events.push(LifecycleEvent::Swept { removed });
                    }
                    let mut next = fire_at + self.policy.sweep_interval;
                    if next <= now {
                        next = now + self.policy.sweep_interval;
                    }
                    self.timers.schedule_at(LifecycleTimer::Sweep, next);
                }
            }
        }
        events
    }

    /// Remove every task completed more than `stale_after` before `now`.
    pub fn sweep_stale(&mut self, store: &mut TaskStore, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - self.policy.stale_after;
        let stale = store.completed_before(cutoff);
        for id in &stale {
            store.purge(id);
            self.timers.cancel(&LifecycleTimer::UndoExpiry(id.clone()));
            self.timers.cancel(&LifecycleTimer::Purge(id.clone()));
        }
        if stale.is_empty() {
            debug!("sweep found no stale completed tasks");
        } else {
            info!(removed = stale.len(), "stale completed tasks swept");
        }
        stale
    }

    pub fn complete(
        &mut self,
        store: &mut TaskStore,
        score: &mut Scoreboard,
        id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        store.mark_completed(id, now)?;
        score.award(self.policy.completion_reward);
        self.timers.schedule_at(
            LifecycleTimer::UndoExpiry(id.to_string()),
            self.policy.completion_undo_closes(now),
        );
        info!(task_id = %id, points = score.points(), "task completed");
        Ok(())
    }

    pub fn uncomplete(
        &mut self,
        store: &mut TaskStore,
        score: &mut Scoreboard,
        id: &str,
    ) -> EngineResult<()> {
        let task = store.require(id)?;
        if task.deleted {
            return Err(EngineError::invalid(
                "deleted",
                format!("task {id} is pending deletion; restore it first"),
            ));
        }
        let Some(completed_at) = task.completed_at.filter(|_| task.completed) else {
            return Err(EngineError::invalid("completed", format!("task {id} is not completed")));
        };

        let key = LifecycleTimer::UndoExpiry(id.to_string());
        if !self.timers.is_pending(&key) {
            return Err(EngineError::WindowExpired {
                id: id.to_string(),
                window: UndoWindow::Completion,
                expired_at: self.policy.completion_undo_closes(completed_at),
            });
        }

        store.mark_reopened(id)?;
        self.timers.cancel(&key);
        score.revoke(self.policy.completion_reward);
        info!(task_id = %id, points = score.points(), "task completion undone");
        Ok(())
    }

    pub fn delete(&mut self, store: &mut TaskStore, id: &str, now: DateTime<Utc>) -> EngineResult<()> {
        store.mark_deleted(id, now)?;
        self.timers.schedule_at(
            LifecycleTimer::Purge(id.to_string()),
            now + self.policy.undo_window,
        );
        info!(task_id = %id, "task soft-deleted");
        Ok(())
    }

    pub fn restore(&mut self, store: &mut TaskStore, id: &str) -> EngineResult<()> {
        let task = store.require(id)?;
        let Some(deleted_at) = task.deleted_at.filter(|_| task.deleted) else {
            return Err(EngineError::invalid("deleted", format!("task {id} is not deleted")));
        };

        let key = LifecycleTimer::Purge(id.to_string());
        if !self.timers.is_pending(&key) {
            return Err(EngineError::WindowExpired {
                id: id.to_string(),
                window: UndoWindow::Deletion,
                expired_at: deleted_at + self.policy.undo_window,
            });
        }

        store.mark_restored(id)?;
        self.timers.cancel(&key);
        info!(task_id = %id, "task restored");
        Ok(())
    }
}
