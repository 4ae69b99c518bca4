use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::datetime::Calendar;
use crate::task::Task;

/// Whole-list counters shown on the overview panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub pending: usize,
    pub completed: usize,
    pub completion_rate: u8,
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let ratio = part as f64 * 100.0 / whole as f64;
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Pending tasks due on `today`.
pub fn due_today_count(tasks: &[Task], today: NaiveDate) -> usize {
    tasks
        .iter()
        .filter(|task| !task.completed && task.is_due_on(today))
        .count()
}

/// Share of today's workload already done, 0-100.
///
/// Returns 0 whenever nothing pending is due today, even if tasks were
/// completed today.
pub fn daily_progress(tasks: &[Task], calendar: &Calendar, now: DateTime<Utc>) -> u8 {
    let today = calendar.today(now);
    let pending = due_today_count(tasks, today);
    if pending == 0 {
        return 0;
    }

    let completed = tasks
        .iter()
        .filter(|task| task.completed)
        .filter(|task| {
            task.completed_at
                .map(|at| calendar.date_of(at) == today)
                .unwrap_or(false)
        })
        .count();

    percent(completed, pending + completed)
}

pub fn overview(tasks: &[Task]) -> Overview {
    let completed = tasks.iter().filter(|task| task.completed).count();
    Overview {
        pending: tasks.len() - completed,
        completed,
        completion_rate: percent(completed, tasks.len()),
    }
}
