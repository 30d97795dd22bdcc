use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use taskace_core::time::{local_day, parse_deadline};
use taskace_core::{
    Assignment, Category, Clock, DayPart, LifecycleEvent, PreferencesPatch, Priority, Session,
    SessionConfig, StateSnapshot, SystemClock, Task, TaskDraft, TaskPatch, TemplateDraft,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

mod config;
mod parse;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "taskace",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TASKACE_BUILD_SHA"), ")"),
    about = "TaskAce: prioritized task planning from the terminal"
)]
struct Cli {
    /// State file (default: ~/.taskace/state.json)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task
    Add {
        title: String,
        /// Deadline: "YYYY-MM-DD HH:MM", "YYYY-MM-DD" or relative "+3d" / "+6h" / "+90m"
        #[arg(long)]
        due: String,
        #[arg(long, default_value = "Personal", value_parser = Category::from_str)]
        category: Category,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        /// Estimated minutes
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Mark a task completed (+points)
    Done { id: String },

    /// Undo a completion (within the undo window)
    Undo { id: String },

    /// Delete a task (restorable within the undo window)
    Rm { id: String },

    /// Restore a deleted task
    Restore { id: String },

    /// Change task fields
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = Category::from_str)]
        category: Option<Category>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long, conflicts_with = "clear_minutes")]
        minutes: Option<u32>,
        /// Drop the estimate
        #[arg(long)]
        clear_minutes: bool,
        /// Record that you worked on it now
        #[arg(long)]
        worked: bool,
    },

    /// Show one task as JSON
    Show { id: String },

    /// Tasks due today
    Today,

    /// Tasks completed on a day ("today", "yesterday" or YYYY-MM-DD)
    On { date: String },

    /// Completed tasks from the last two months
    Completed,

    /// Current plan for the coming days
    Plan {
        /// Re-plan before printing
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Point total
    Points,

    /// Scheduling preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },

    /// Daily schedule templates
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Keep running: fire undo/purge timers and the hourly sweep, print plan changes
    Watch {
        /// Seconds between timer checks
        #[arg(long, default_value_t = 5)]
        every: u64,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    Show,
    Set {
        #[arg(long)]
        study_time: Option<DayPart>,
        #[arg(long)]
        max_tasks: Option<u32>,
        /// Minutes between planned tasks
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Default minutes for tasks without an estimate
        #[arg(long)]
        session: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    List,
    /// e.g. `taskace template add "Exam week" --item "08:00-12:00 Work/Study" --item "12:00-13:00 Lunch"`
    Add {
        name: String,
        #[arg(long = "item", required = true)]
        items: Vec<String>,
        /// Make it the active template
        #[arg(long)]
        activate: bool,
    },
    /// Switch the active template
    Use { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.taskace/config.toml with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log.level)),
        )
        .init();

    let session_cfg = cfg.session_config()?;
    let path = match cli.state {
        Some(p) => p,
        None => state::state_path()?,
    };

    match cli.command {
        Command::Config { command: ConfigCommand::Init } => config::init_config(),
        Command::Watch { every } => watch(&path, session_cfg, every).await,
        command => {
            let mut session = open_session(&path, session_cfg)?;
            let outcome = run(&mut session, command);
            // Persist even after a failed command: timers may have fired.
            state::write_snapshot(&path, &session.close())?;
            outcome
        }
    }
}

fn open_session(path: &Path, cfg: SessionConfig) -> Result<Session<SystemClock>> {
    let session = match state::read_snapshot(path)? {
        Some(snapshot) => Session::from_snapshot(SystemClock, cfg, snapshot)
            .with_context(|| format!("load {}", path.display()))?,
        None => Session::new(SystemClock, cfg),
    };
    Ok(session)
}

fn run<C: Clock>(session: &mut Session<C>, command: Command) -> Result<()> {
    let tz = session.config().timezone;
    let now = session.clock().now();

    match command {
        Command::Add { title, due, category, priority, minutes, description } => {
            let deadline = parse_deadline(&due, tz, now)?;
            let mut draft = TaskDraft::new(title, category, priority, deadline);
            if let Some(m) = minutes {
                draft = draft.with_duration(m);
            }
            if let Some(d) = description {
                draft = draft.with_description(d);
            }
            let task = session.add_task(draft)?;
            println!("Added {}", task_line(&task, tz));
        }

        Command::Done { id } => {
            let id = resolve_id(session, &id)?;
            let task = session.complete_task(&id)?;
            println!("Completed {} (+{} points, total {})", task.title, session.config().policy.completion_reward, session.points());
            println!("Undo with: taskace undo {}", short_id(&task.id));
        }

        Command::Undo { id } => {
            let id = resolve_id(session, &id)?;
            let task = session.uncomplete_task(&id)?;
            println!("Reopened {} (total {} points)", task.title, session.points());
        }

        Command::Rm { id } => {
            let id = resolve_id(session, &id)?;
            session.delete_task(&id)?;
            println!(
                "Deleted {}. Restore within {}s with: taskace restore {}",
                short_id(&id),
                session.config().policy.undo_window.num_seconds(),
                short_id(&id)
            );
        }

        Command::Restore { id } => {
            let id = resolve_id(session, &id)?;
            let task = session.restore_task(&id)?;
            println!("Restored {}", task_line(&task, tz));
        }

        Command::Edit { id, title, description, category, priority, due, minutes, clear_minutes, worked } => {
            let id = resolve_id(session, &id)?;
            let patch = TaskPatch {
                title,
                description,
                category,
                priority,
                deadline: due.map(|d| parse_deadline(&d, tz, now)).transpose()?,
                estimated_duration: if clear_minutes { Some(None) } else { minutes.map(Some) },
                last_worked_on: worked.then_some(now),
            };
            if patch.is_empty() {
                bail!("nothing to change (see taskace edit --help)");
            }
            let task = session.update_task(&id, patch)?;
            println!("Updated {}", task_line(&task, tz));
        }

        Command::Show { id } => {
            let id = resolve_id(session, &id)?;
            let task = session.task(&id)?;
            println!("{}", serde_json::to_string_pretty(task)?);
        }

        Command::Today => {
            print_tasks("Due today", &session.todays_tasks(), tz);
        }

        Command::On { date } => {
            let day = parse::parse_day(&date, local_day(now, tz))?;
            print_tasks(&format!("Completed on {day}"), &session.tasks_by_date(day), tz);
        }

        Command::Completed => {
            print_tasks("Completed (last two months)", &session.completed_tasks(), tz);
        }

        Command::Plan { refresh, limit } => {
            let template = session
                .active_template()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "(none)".to_string());
            let plan = if refresh { session.reschedule() } else { session.assignments() };
            println!("# Plan ({template})\n");
            if plan.is_empty() {
                println!("Nothing to plan.");
            }
            print_plan(plan, limit.unwrap_or(usize::MAX));
        }

        Command::Points => {
            println!("{}", session.points());
        }

        Command::Prefs { command } => match command {
            PrefsCommand::Show => {
                let p = session.preferences();
                println!("preferred study time: {}", p.preferred_study_time);
                println!("max tasks per day:    {}", p.max_tasks_per_day);
                println!("break duration:       {} min", p.break_duration);
                println!("study session:        {} min", p.study_session_duration);
            }
            PrefsCommand::Set { study_time, max_tasks, break_minutes, session: session_minutes } => {
                let patch = PreferencesPatch {
                    preferred_study_time: study_time,
                    max_tasks_per_day: max_tasks,
                    break_duration: break_minutes,
                    study_session_duration: session_minutes,
                };
                if patch == PreferencesPatch::default() {
                    bail!("nothing to change (see taskace prefs set --help)");
                }
                let p = session.update_preferences(&patch)?;
                println!("Saved. {} assignments after re-plan.", session.assignments().len());
                debug!(?p, "preferences updated");
            }
        },

        Command::Template { command } => match command {
            TemplateCommand::List => {
                let active = session.active_template().map(|t| t.id.clone());
                for t in session.templates() {
                    let marker = if Some(&t.id) == active.as_ref() { "*" } else { " " };
                    println!("{marker} {}  {}", short_id(&t.id), t.name);
                    for item in &t.schedule_items {
                        println!("      {}-{}  {}", item.start_time, item.end_time, item.activity);
                    }
                }
            }
            TemplateCommand::Add { name, items, activate } => {
                let schedule_items = items
                    .iter()
                    .map(|s| parse::parse_schedule_item(s))
                    .collect::<Result<Vec<_>>>()?;
                let template = session.add_template(TemplateDraft { name, schedule_items })?;
                println!("Added template {} ({})", template.name, short_id(&template.id));
                if activate {
                    session.set_active_template(&template.id)?;
                    println!("Now active.");
                }
            }
            TemplateCommand::Use { id } => {
                let id = resolve_template_id(session, &id)?;
                let template = session.set_active_template(&id)?;
                println!("Active template: {}", template.name);
            }
        },

        Command::Config { .. } | Command::Watch { .. } => {
            bail!("config and watch run without a one-shot session")
        }
    }

    Ok(())
}

async fn watch(path: &Path, cfg: SessionConfig, every: u64) -> Result<()> {
    let mut session = open_session(path, cfg)?;
    let mut updates = session.subscribe();
    let (snapshots, writer) = spawn_snapshot_writer(path.to_path_buf(), session.snapshot());
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(every.max(1)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("Watching {} (Ctrl-C to stop)", path.display());
    loop {
        tokio::select! {
            _ = tick.tick() => {
                for event in session.tick() {
                    print_lifecycle_event(&event);
                }
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    println!(
                        "plan r{}: {} assignments ({} changes)",
                        update.revision,
                        update.assignments,
                        update.changes.len()
                    );
                    snapshots.send_replace(session.snapshot());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "plan updates lagged");
                    snapshots.send_replace(session.snapshot());
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    // Let the pending background write land before the final one.
    drop(snapshots);
    writer.await.context("snapshot writer")?;
    state::write_snapshot(path, &session.close())?;
    println!("Stopped.");
    Ok(())
}

/// One writer task owns the state file while watching. Only the newest
/// snapshot is written and writes never overlap. The task ends once the
/// sender is dropped and the last pending snapshot is on disk.
fn spawn_snapshot_writer(
    path: PathBuf,
    initial: StateSnapshot,
) -> (watch::Sender<StateSnapshot>, JoinHandle<()>) {
    let (tx, mut rx) = watch::channel(initial);
    let handle = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            let target = path.clone();
            match tokio::task::spawn_blocking(move || state::write_snapshot(&target, &snapshot)).await {
                Ok(Ok(())) => debug!(path = %path.display(), "snapshot written"),
                Ok(Err(e)) => warn!(error = %e, path = %path.display(), "snapshot write failed"),
                Err(e) => warn!(error = %e, "snapshot write task panicked"),
            }
        }
    });
    (tx, handle)
}

fn print_lifecycle_event(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::UndoWindowClosed { id } => println!("undo window closed for {}", short_id(id)),
        LifecycleEvent::Purged { id } => println!("purged {}", short_id(id)),
        LifecycleEvent::Swept { removed } => println!("swept {} stale completed tasks", removed.len()),
    }
}

/// Accept a full id or any unique prefix of one.
fn resolve_id<C: Clock>(session: &mut Session<C>, input: &str) -> Result<String> {
    let ids: Vec<String> = session.tasks().iter().map(|t| t.id.clone()).collect();
    pick_id(ids.iter().map(String::as_str), input)
}

fn resolve_template_id<C: Clock>(session: &Session<C>, input: &str) -> Result<String> {
    pick_id(session.templates().iter().map(|t| t.id.as_str()), input)
}

fn pick_id<'a>(ids: impl Iterator<Item = &'a str>, input: &str) -> Result<String> {
    let mut matches = Vec::new();
    for id in ids {
        if id == input {
            return Ok(id.to_string());
        }
        if id.starts_with(input) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [one] => Ok(one.to_string()),
        [] => Ok(input.to_string()),
        many => bail!("'{input}' matches {} ids; give more characters", many.len()),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn local(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

fn task_line(t: &Task, tz: Tz) -> String {
    let mark = if t.deleted {
        "x"
    } else if t.completed {
        "✓"
    } else {
        " "
    };
    let minutes = t
        .estimated_duration
        .map(|m| format!(", {m} min"))
        .unwrap_or_default();
    format!(
        "[{mark}] {}  {} ({}, {}{minutes}) due {}",
        short_id(&t.id),
        t.title,
        t.category,
        t.priority,
        local(t.deadline, tz)
    )
}

fn print_tasks(heading: &str, tasks: &[&Task], tz: Tz) {
    println!("# {heading}\n");
    if tasks.is_empty() {
        println!("(none)");
    }
    for t in tasks {
        println!("- {}", task_line(t, tz));
    }
}

fn print_plan(plan: &[Assignment], limit: usize) {
    let mut current = None;
    for a in plan.iter().take(limit) {
        if current != Some(a.date) {
            println!("## {}", a.date.format("%a %Y-%m-%d"));
            current = Some(a.date);
        }
        println!(
            "- {:<21} {}  [{}] {}",
            a.time_slot,
            short_id(&a.task.id),
            a.task.priority,
            a.task.title
        );
    }
}
