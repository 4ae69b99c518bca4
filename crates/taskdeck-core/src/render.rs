use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, NaiveDate, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::controller::{AppState, ListView, NoticeLevel, Notification};
use crate::datetime::{Calendar, Urgency, classify_due};
use crate::task::{Priority, Task};

const NO_TASKS_TITLE: &str = "Ready to get organized?";
const NO_TASKS_HINT: &str = "Start by creating your first task. Break down your goals into manageable steps and track your progress.";
const NO_MATCHES_TITLE: &str = "No tasks found";
const NO_MATCHES_HINT: &str = "Try adjusting your search or filters";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true) && io::stdout().is_terminal();
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, state, calendar, now))]
    pub fn print_list(
        &self,
        state: &AppState,
        calendar: &Calendar,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_list(&mut out, state, calendar.today(now))
    }

    pub fn write_list<W: Write>(
        &self,
        mut out: W,
        state: &AppState,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        match state.list_view() {
            ListView::NoTasks => {
                writeln!(out, "{NO_TASKS_TITLE}")?;
                writeln!(out, "{NO_TASKS_HINT}")?;
            }
            ListView::NoMatches => {
                writeln!(out, "{NO_MATCHES_TITLE}")?;
                writeln!(out, "{NO_MATCHES_HINT}")?;
            }
            ListView::Tasks(tasks) => {
                let rows = tasks
                    .iter()
                    .map(|task| self.task_row(state, task, today))
                    .collect();
                write_table(&mut out, headers(), rows)?;
                writeln!(out)?;
                writeln!(out, "{} of {} tasks", tasks.len(), state.tasks.len())?;
            }
        }
        Ok(())
    }

    fn task_row(&self, state: &AppState, task: &Task, today: NaiveDate) -> Vec<String> {
        let mark = if state.selection.contains(task.id) {
            "*"
        } else {
            " "
        };
        let done = if task.completed { "[x]" } else { "[ ]" };

        let title = if task.completed {
            self.paint(&task.title, "9")
        } else {
            task.title.clone()
        };

        let category = match hex_to_rgb(state.category_color(&task.category)) {
            Some((r, g, b)) => self.paint(&task.category, &format!("38;2;{r};{g};{b}")),
            None => task.category.clone(),
        };

        let priority_code = match task.priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        let priority = self.paint(task.priority.as_str(), priority_code);

        let due = match classify_due(task.due_date, today) {
            Some(badge) => match urgency_code(badge.urgency) {
                Some(code) => self.paint(&badge.label, code),
                None => badge.label,
            },
            None => String::new(),
        };

        vec![
            mark.to_string(),
            self.paint(&task.short_id(), "33"),
            done.to_string(),
            title,
            category,
            priority,
            due,
        ]
    }

    #[tracing::instrument(skip(self, state, calendar, now))]
    pub fn print_stats(
        &self,
        state: &AppState,
        calendar: &Calendar,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let today = calendar.today(now);
        let overview = state.overview();

        writeln!(out, "today       {today} ({calendar})")?;
        writeln!(out, "due today   {}", state.due_today_count(today))?;
        writeln!(out, "progress    {}%", state.daily_progress(calendar, now))?;
        writeln!(out, "pending     {}", overview.pending)?;
        writeln!(out, "completed   {}", overview.completed)?;
        writeln!(out, "rate        {}%", overview.completion_rate)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, state))]
    pub fn print_categories(&self, state: &AppState) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = state
            .categories
            .iter()
            .map(|category| {
                let count = state
                    .tasks
                    .iter()
                    .filter(|task| task.category == category.name)
                    .count();
                let name = match hex_to_rgb(&category.color) {
                    Some((r, g, b)) => self.paint(&category.name, &format!("38;2;{r};{g};{b}")),
                    None => category.name.clone(),
                };
                vec![name, category.color.clone(), category.icon.clone(), count.to_string()]
            })
            .collect();

        write_table(
            &mut out,
            vec![
                "Name".to_string(),
                "Color".to_string(),
                "Icon".to_string(),
                "Tasks".to_string(),
            ],
            rows,
        )
    }

    pub fn print_notifications(&self, notifications: &[Notification]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        for notification in notifications {
            let (prefix, code) = match notification.level {
                NoticeLevel::Success => ("ok", "32"),
                NoticeLevel::Error => ("error", "31"),
            };
            let prefix = if self.color && io::stderr().is_terminal() {
                format!("\x1b[{code}m{prefix}\x1b[0m")
            } else {
                prefix.to_string()
            };
            writeln!(err, "{prefix}: {}", notification.message)?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn headers() -> Vec<String> {
    ["", "ID", "Done", "Title", "Category", "Priority", "Due"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn urgency_code(urgency: Urgency) -> Option<&'static str> {
    match urgency {
        Urgency::Current => Some("33"),
        Urgency::Upcoming => Some("34"),
        Urgency::Critical => Some("31"),
        Urgency::Normal => None,
    }
}

fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{cell}{} ", " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}
