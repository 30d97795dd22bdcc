//! Engine error taxonomy.
//!
//! Every failure is recoverable and reported synchronously to the caller.
//! Each variant carries enough context (id, window, field) for a front end
//! to render a specific message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of record a lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Template,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => f.write_str("task"),
            EntityKind::Template => f.write_str("template"),
        }
    }
}

/// The two undo windows. They run on distinct timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoWindow {
    Completion,
    Deletion,
}

impl std::fmt::Display for UndoWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoWindow::Completion => f.write_str("completion"),
            UndoWindow::Deletion => f.write_str("deletion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{window} undo window for task {id} closed at {expired_at}")]
    WindowExpired {
        id: String,
        window: UndoWindow,
        expired_at: DateTime<Utc>,
    },

    #[error("invalid {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },
}

impl EngineError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: EntityKind::Task,
            id: id.into(),
        }
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: EntityKind::Template,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn messages_name_the_offending_id_window_and_field() {
        let e = EngineError::task_not_found("t-42");
        assert_eq!(e.to_string(), "task t-42 not found");

        let e = EngineError::WindowExpired {
            id: "t-1".into(),
            window: UndoWindow::Completion,
            expired_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 30).unwrap(),
        };
        let msg = e.to_string();
        assert!(msg.contains("completion"));
        assert!(msg.contains("t-1"));

        let e = EngineError::invalid("title", "must not be empty");
        assert_eq!(e.to_string(), "invalid title: must not be empty");
    }
}
