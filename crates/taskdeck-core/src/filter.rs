use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Named(String)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Completed,
  Pending
}

/// The three dropdown filters. `Default`
/// is the "clear filters" target.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct TaskFilters {
  pub category: CategoryFilter,
  pub priority: PriorityFilter,
  pub status:   StatusFilter
}

impl FromStr for CategoryFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(anyhow!(
        "category filter cannot be \
         empty"
      ));
    }
    if trimmed == "all" {
      Ok(CategoryFilter::All)
    } else {
      Ok(CategoryFilter::Named(
        trimmed.to_string()
      ))
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim() == "all" {
      return Ok(PriorityFilter::All);
    }
    let priority = s
      .parse::<Priority>()
      .map_err(|err| anyhow!(err))?;
    Ok(PriorityFilter::Only(priority))
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | "pending" => {
        Ok(StatusFilter::Pending)
      }
      | other => Err(anyhow!(
        "unknown status filter: \
         {other}"
      ))
    }
  }
}

impl CategoryFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | CategoryFilter::All => true,
      | CategoryFilter::Named(name) => {
        task.category == *name
      }
    }
  }
}

impl PriorityFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | PriorityFilter::All => true,
      | PriorityFilter::Only(
        priority
      ) => task.priority == *priority
    }
  }
}

impl StatusFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Completed => {
        task.completed
      }
      | StatusFilter::Pending => {
        !task.completed
      }
    }
  }
}

impl TaskFilters {
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self.category.matches(task)
      && self.priority.matches(task)
      && self.status.matches(task)
  }

  pub fn is_default(&self) -> bool {
    *self == Self::default()
  }
}

/// Case-insensitive substring match on
/// title or description. `needle` must
/// already be lowercased.
fn matches_search(
  task: &Task,
  needle: &str
) -> bool {
  if needle.is_empty() {
    return true;
  }

  let title_match = task
    .title
    .to_lowercase()
    .contains(needle);
  let description_match = task
    .description
    .as_deref()
    .unwrap_or_default()
    .to_lowercase()
    .contains(needle);

  title_match || description_match
}

/// Tasks passing the search query and
/// all three filters, in input order.
#[tracing::instrument(skip(
  tasks, filters
))]
pub fn visible_tasks(
  tasks: &[Task],
  query: &str,
  filters: &TaskFilters
) -> Vec<Task> {
  let needle = query.to_lowercase();

  let visible: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      matches_search(task, &needle)
        && filters.matches(task)
    })
    .cloned()
    .collect();

  trace!(
    total = tasks.len(),
    visible = visible.len(),
    "filtered task list"
  );
  visible
}

/// Whether anything narrows the list,
/// i.e. whether "clear filters" applies.
pub fn has_active_filters(
  query: &str,
  filters: &TaskFilters
) -> bool {
  !query.is_empty()
    || !filters.is_default()
}
