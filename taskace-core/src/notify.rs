//! Store change events.
//!
//! Stores never call observers directly. Each mutation queues a
//! [`StoreEvent`] on the store's [`ChangeFeed`]; the session drains the
//! feeds after the operation finishes and hands the batch to every
//! [`ChangeObserver`]. Recomputation therefore never runs re-entrantly in
//! the middle of a mutation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "id", rename_all = "snake_case")]
pub enum StoreEvent {
    TaskAdded(String),
    TaskUpdated(String),
    TaskCompleted(String),
    TaskReopened(String),
    TaskDeleted(String),
    TaskRestored(String),
    TaskPurged(String),
    PreferencesChanged,
    TemplateAdded(String),
    ActiveTemplateChanged(String),
    /// Explicit re-plan request with no underlying data change.
    RescheduleRequested,
}

impl StoreEvent {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            StoreEvent::TaskAdded(id)
            | StoreEvent::TaskUpdated(id)
            | StoreEvent::TaskCompleted(id)
            | StoreEvent::TaskReopened(id)
            | StoreEvent::TaskDeleted(id)
            | StoreEvent::TaskRestored(id)
            | StoreEvent::TaskPurged(id) => Some(id),
            _ => None,
        }
    }
}

/// Pending change events of one store.
#[derive(Debug, Clone, Default)]
pub struct ChangeFeed {
    pending: Vec<StoreEvent>,
}

impl ChangeFeed {
    pub fn emit(&mut self, event: StoreEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Receives batches of store events once a mutation has settled.
pub trait ChangeObserver<I: ?Sized> {
    fn on_change(&mut self, events: &[StoreEvent], inputs: &I);
}
