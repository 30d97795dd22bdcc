//! Priority ranker: composite score over priority, deadline proximity,
//! category weight and whether the task carries an estimate.
//!
//! Ranking (deterministic):
//! - total score DESC
//! - ties keep input order (stable sort), which for the session is
//!   task-store insertion order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Category, Priority, Task};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub priority: i32,
    pub deadline: i32,
    pub category: i32,
    pub estimation: i32,
    pub total: i32,
}

pub fn priority_score(priority: Priority) -> i32 {
    match priority {
        Priority::High => 10,
        Priority::Medium => 5,
        Priority::Low => 1,
    }
}

pub fn category_score(category: &Category) -> i32 {
    match category {
        Category::Education | Category::AcademicTasks => 5,
        Category::PersonalDevelopment | Category::DailyResponsibilities => 4,
        Category::Personal | Category::LifeManagement => 3,
        Category::Household => 2,
        Category::Rewards | Category::Breaks | Category::Uncategorized(_) => 1,
    }
}

/// Whole days until `deadline`, rounded up, never negative.
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (deadline - now).num_milliseconds();
    if ms <= 0 { 0 } else { (ms + DAY_MS - 1) / DAY_MS }
}

/// 10 when due today or overdue, down to 0 at ten or more days out.
pub fn deadline_score(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    (10 - days_until(deadline, now)).clamp(0, 10) as i32
}

pub fn score(task: &Task, now: DateTime<Utc>) -> ScoreBreakdown {
    let priority = priority_score(task.priority);
    let deadline = deadline_score(task.deadline, now);
    let category = category_score(&task.category);
    let estimation = i32::from(task.estimated_duration.is_some());

    ScoreBreakdown {
        priority,
        deadline,
        category,
        estimation,
        total: priority * 3 + deadline * 2 + category + estimation,
    }
}

/// Order incomplete, non-deleted tasks by descending score.
pub fn rank<'a, I>(tasks: I, now: DateTime<Utc>) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut scored: Vec<(i32, &Task)> = tasks
        .into_iter()
        .filter(|t| !t.completed && !t.deleted)
        .map(|t| (score(t, now).total, t))
        .collect();

    // Vec::sort_by is stable: equal scores keep their input order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, t)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn task(id: &str, priority: Priority, category: Category, deadline: DateTime<Utc>) -> Task {
        TaskDraft::new(id, category, priority, deadline).into_task(id.into(), now())
    }

    #[test]
    fn deadline_score_rounds_days_up_and_clamps() {
        assert_eq!(deadline_score(now() - Duration::days(3), now()), 10);
        assert_eq!(deadline_score(now(), now()), 10);
        assert_eq!(deadline_score(now() + Duration::minutes(1), now()), 9);
        assert_eq!(deadline_score(now() + Duration::days(1), now()), 9);
        assert_eq!(deadline_score(now() + Duration::days(10), now()), 0);
        assert_eq!(deadline_score(now() + Duration::days(15), now()), 0);
    }

    #[test]
    fn composite_score_matches_weights() {
        let t = TaskDraft::new("x", Category::Education, Priority::High, now() + Duration::days(2))
            .with_duration(30)
            .into_task("x".into(), now());
        let s = score(&t, now());
        assert_eq!(
            s,
            ScoreBreakdown { priority: 10, deadline: 8, category: 5, estimation: 1, total: 30 + 16 + 5 + 1 }
        );

        let u = task("u", Priority::Low, Category::Uncategorized("Gardening".into()), now() + Duration::days(30));
        assert_eq!(score(&u, now()).total, 3 + 0 + 1);
    }

    #[test]
    fn high_priority_ranks_before_low() {
        let dl = now() + Duration::days(3);
        let low = task("low", Priority::Low, Category::Personal, dl);
        let high = task("high", Priority::High, Category::Personal, dl);
        let tasks = vec![low, high];

        let ranked: Vec<_> = rank(&tasks, now()).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ranked, vec!["high", "low"]);
    }

    #[test]
    fn due_today_ranks_before_due_in_fifteen_days() {
        let later = task("later", Priority::Medium, Category::Household, now() + Duration::days(15));
        let today = task("today", Priority::Medium, Category::Household, now() + Duration::hours(3));
        let tasks = vec![later, today];

        let ranked: Vec<_> = rank(&tasks, now()).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ranked, vec!["today", "later"]);
    }

    #[test]
    fn ties_keep_input_order_and_finished_tasks_are_skipped() {
        let dl = now() + Duration::days(4);
        let a = task("a", Priority::Medium, Category::Personal, dl);
        let b = task("b", Priority::Medium, Category::Personal, dl);
        let mut done = task("done", Priority::High, Category::Education, dl);
        done.completed = true;
        done.completed_at = Some(now());
        let mut gone = task("gone", Priority::High, Category::Education, dl);
        gone.deleted = true;
        gone.deleted_at = Some(now());
        let c = task("c", Priority::Medium, Category::Personal, dl);
        let tasks = vec![a, done, b, gone, c];

        let ranked: Vec<_> = rank(&tasks, now()).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ranked, vec!["a", "b", "c"]);
    }
}
