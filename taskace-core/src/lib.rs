//! taskace-core: scheduling and lifecycle engine for the TaskAce task manager

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod orchestrator;
pub mod packer;
pub mod preferences;
pub mod ranker;
pub mod session;
pub mod snapshot;
pub mod task;
pub mod task_store;
pub mod templates;
pub mod time;
pub mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult, EntityKind, UndoWindow};
pub use lifecycle::{LifecycleController, LifecycleEvent, LifecyclePolicy, LifecycleTimer, Scoreboard};
pub use notify::{ChangeFeed, ChangeObserver, StoreEvent};
pub use orchestrator::{Orchestrator, PlanInputs, PlanUpdate};
pub use packer::{effective_duration, pack, Assignment, DEFAULT_HORIZON_DAYS};
pub use preferences::{DayPart, PreferenceStore, PreferencesPatch, UserPreferences};
pub use ranker::{rank, score, ScoreBreakdown};
pub use session::{Session, SessionConfig};
pub use snapshot::StateSnapshot;
pub use task::{Category, Priority, Task, TaskDraft, TaskPatch, TaskState, MAX_DURATION_MINUTES};
pub use task_store::TaskStore;
pub use templates::{ScheduleItem, ScheduleItemDraft, ScheduleTemplate, TemplateDraft, TemplateStore};
pub use time::TimeOfDay;
pub use timers::TimerService;
