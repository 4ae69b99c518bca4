use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(StoreError::Validation(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub category: String,

    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creation payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update. Outer `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    /// Patch that flips completion and carries the matching timestamp.
    pub fn completion(completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(now)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Task {
    pub fn from_new(new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.priority,
            due_date: new.due_date,
            completed: false,
            created_at: now,
            completed_at: None,
        }
    }

    /// Merge `patch` into the record. `completed_at` always ends up non-null
    /// exactly when `completed` is true.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }

        if self.completed {
            self.completed_at.get_or_insert(now);
        } else {
            self.completed_at = None;
        }
    }

    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due_date == Some(day)
    }

    pub fn short_id(&self) -> String {
        let mut id = self.id.simple().to_string();
        id.truncate(8);
        id
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{NewTask, Priority, Task, TaskPatch};

    fn sample(now: chrono::DateTime<Utc>) -> Task {
        Task::from_new(
            NewTask {
                title: "Write report".to_string(),
                description: None,
                category: "Work".to_string(),
                priority: Priority::High,
                due_date: NaiveDate::from_ymd_opt(2026, 3, 5),
            },
            now,
        )
    }

    #[test]
    fn new_tasks_start_pending() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let task = sample(now);
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.created_at, now);
    }

    #[test]
    fn completion_patch_keeps_timestamp_in_sync() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = sample(now);

        for step in 0..5 {
            let at = now + Duration::minutes(step);
            let next = !task.completed;
            task.apply_patch(TaskPatch::completion(next, at), at);
            assert_eq!(task.completed, next);
            assert_eq!(task.completed, task.completed_at.is_some());
        }
    }

    #[test]
    fn partial_completion_patch_repairs_invariant() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = sample(now);

        task.apply_patch(
            TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            },
            now,
        );
        assert_eq!(task.completed_at, Some(now));

        task.apply_patch(
            TaskPatch {
                completed: Some(false),
                ..TaskPatch::default()
            },
            now,
        );
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = sample(now);
        task.apply_patch(
            TaskPatch {
                due_date: Some(None),
                priority: Some(Priority::Low),
                ..TaskPatch::default()
            },
            now,
        );
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.category, "Work");
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let task = sample(now);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["dueDate"], "2026-03-05");
        assert_eq!(json["priority"], "high");
        assert!(json["completedAt"].is_null());
    }

    #[test]
    fn parses_priority_names() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("m".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
