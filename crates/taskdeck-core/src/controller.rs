//! Application state and the command/effect loop that drives it.
//!
//! [`update`] is pure: it folds one [`Command`] into [`AppState`] and returns
//! the [`Effect`]s to run. [`Controller`] owns the state plus the store
//! handles, executes effects, and feeds their results back as commands until
//! nothing is left to do.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::category::{self, Category, FALLBACK_CATEGORY_NAME};
use crate::datetime::Calendar;
use crate::error::StoreError;
use crate::filter::{self, CategoryFilter, PriorityFilter, StatusFilter, TaskFilters};
use crate::progress::{self, Overview};
use crate::selection::Selection;
use crate::store::{CategoryStore, Stores, TaskStore};
use crate::task::{NewTask, Priority, Task, TaskPatch};

const TITLE_REQUIRED: &str = "Title is required";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Loading,
    Error(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Unvalidated contents of the task creation form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormErrors {
    pub title: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }
}

impl TaskDraft {
    /// Trim the free-text fields and build the creation payload.
    pub fn validate(&self) -> Result<NewTask, FormErrors> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormErrors {
                title: Some(TITLE_REQUIRED.to_string()),
            });
        }

        let description = self.description.trim();
        let category = match self.category.trim() {
            "" => FALLBACK_CATEGORY_NAME,
            name => name,
        };

        Ok(NewTask {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            category: category.to_string(),
            priority: self.priority,
            due_date: self.due_date,
        })
    }
}

/// What the task list area should show.
#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    /// No tasks exist at all.
    NoTasks,
    /// Tasks exist but the query and filters hide every one.
    NoMatches,
    Tasks(Vec<Task>),
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub phase: Phase,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub query: String,
    pub filters: TaskFilters,
    pub selection: Selection,
    pub form_open: bool,
    pub form_errors: FormErrors,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        filter::visible_tasks(&self.tasks, &self.query, &self.filters)
    }

    pub fn list_view(&self) -> ListView {
        if self.tasks.is_empty() {
            return ListView::NoTasks;
        }
        let visible = self.visible_tasks();
        if visible.is_empty() {
            ListView::NoMatches
        } else {
            ListView::Tasks(visible)
        }
    }

    pub fn has_active_filters(&self) -> bool {
        filter::has_active_filters(&self.query, &self.filters)
    }

    pub fn daily_progress(&self, calendar: &Calendar, now: DateTime<Utc>) -> u8 {
        progress::daily_progress(&self.tasks, calendar, now)
    }

    pub fn overview(&self) -> Overview {
        progress::overview(&self.tasks)
    }

    pub fn due_today_count(&self, today: NaiveDate) -> usize {
        progress::due_today_count(&self.tasks, today)
    }

    pub fn category_color(&self, name: &str) -> &str {
        category::category_color(&self.categories, name)
    }

    /// Category preselected in a fresh creation form.
    pub fn default_category(&self) -> &str {
        self.categories
            .first()
            .map(|category| category.name.as_str())
            .unwrap_or(FALLBACK_CATEGORY_NAME)
    }

    /// Empty draft with the default category filled in.
    pub fn new_draft(&self) -> TaskDraft {
        TaskDraft {
            category: self.default_category().to_string(),
            ..TaskDraft::default()
        }
    }

    fn replace_task(&mut self, updated: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|task| task.id == updated.id) {
            *slot = updated;
        }
    }

    fn drop_task(&mut self, id: Uuid) {
        self.tasks.retain(|task| task.id != id);
        self.selection.remove(id);
    }
}

/// Everything that can happen to the application: user intents plus the
/// results of store calls.
#[derive(Debug, Clone)]
pub enum Command {
    Load,
    Retry,
    Loaded(Result<(Vec<Task>, Vec<Category>), StoreError>),

    SetQuery(String),
    SetCategoryFilter(CategoryFilter),
    SetPriorityFilter(PriorityFilter),
    SetStatusFilter(StatusFilter),
    ClearFilters,

    ToggleSelect(Uuid),
    SelectAllVisible,
    ClearSelection,

    OpenTaskForm,
    CloseTaskForm,
    SubmitTask(TaskDraft),
    TaskCreated(Result<Task, StoreError>),

    ToggleComplete(Uuid),
    TaskUpdated(Result<Task, StoreError>),

    DeleteTask(Uuid),
    TaskDeleted {
        id: Uuid,
        result: Result<bool, StoreError>,
    },

    BulkComplete,
    BulkCompleted(Vec<(Uuid, Result<Task, StoreError>)>),
    BulkDelete,
    BulkDeleted(Vec<(Uuid, Result<bool, StoreError>)>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Load => "load",
            Command::Retry => "retry",
            Command::Loaded(_) => "loaded",
            Command::SetQuery(_) => "set_query",
            Command::SetCategoryFilter(_) => "set_category_filter",
            Command::SetPriorityFilter(_) => "set_priority_filter",
            Command::SetStatusFilter(_) => "set_status_filter",
            Command::ClearFilters => "clear_filters",
            Command::ToggleSelect(_) => "toggle_select",
            Command::SelectAllVisible => "select_all_visible",
            Command::ClearSelection => "clear_selection",
            Command::OpenTaskForm => "open_task_form",
            Command::CloseTaskForm => "close_task_form",
            Command::SubmitTask(_) => "submit_task",
            Command::TaskCreated(_) => "task_created",
            Command::ToggleComplete(_) => "toggle_complete",
            Command::TaskUpdated(_) => "task_updated",
            Command::DeleteTask(_) => "delete_task",
            Command::TaskDeleted { .. } => "task_deleted",
            Command::BulkComplete => "bulk_complete",
            Command::BulkCompleted(_) => "bulk_completed",
            Command::BulkDelete => "bulk_delete",
            Command::BulkDeleted(_) => "bulk_deleted",
        }
    }

    /// Intents that act on loaded data.
    fn needs_data(&self) -> bool {
        matches!(
            self,
            Command::SubmitTask(_)
                | Command::ToggleComplete(_)
                | Command::DeleteTask(_)
                | Command::SelectAllVisible
                | Command::BulkComplete
                | Command::BulkDelete
        )
    }
}

/// Side effects requested by [`update`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchAll,
    CreateTask(NewTask),
    UpdateTask { id: Uuid, patch: TaskPatch },
    DeleteTask(Uuid),
    CompleteMany(Vec<(Uuid, TaskPatch)>),
    DeleteMany(Vec<Uuid>),
    Notify(Notification),
}

fn tasks_phrase(count: usize) -> String {
    if count == 1 {
        "1 task".to_string()
    } else {
        format!("{count} tasks")
    }
}

fn notify_success(message: impl Into<String>) -> Effect {
    Effect::Notify(Notification::success(message))
}

fn notify_error(message: impl Into<String>) -> Effect {
    Effect::Notify(Notification::error(message))
}

/// Fold `command` into `state`. Store-backed changes are only applied once a
/// result command confirms them.
#[tracing::instrument(skip(state, command, now), fields(command = command.name()))]
pub fn update(state: &mut AppState, command: Command, now: DateTime<Utc>) -> Vec<Effect> {
    if command.needs_data() && !state.is_ready() {
        debug!(phase = ?state.phase, "ignoring command before data is loaded");
        return vec![];
    }

    match command {
        Command::Load | Command::Retry => {
            state.phase = Phase::Loading;
            vec![Effect::FetchAll]
        }
        // A reload drops selected ids that no longer exist in the store.
        Command::Loaded(Ok((tasks, categories))) => {
            info!(tasks = tasks.len(), categories = categories.len(), "data loaded");
            let stale: Vec<Uuid> = state
                .selection
                .ids()
                .iter()
                .copied()
                .filter(|id| !tasks.iter().any(|task| task.id == *id))
                .collect();
            for id in stale {
                state.selection.remove(id);
            }
            state.tasks = tasks;
            state.categories = categories;
            state.phase = Phase::Ready;
            vec![]
        }
        Command::Loaded(Err(err)) => {
            warn!(error = %err, "initial load failed");
            state.tasks.clear();
            state.categories.clear();
            state.selection.clear();
            state.phase = Phase::Error(err.to_string());
            vec![notify_error("Failed to load data")]
        }

        Command::SetQuery(query) => {
            state.query = query;
            vec![]
        }
        Command::SetCategoryFilter(category) => {
            state.filters.category = category;
            vec![]
        }
        Command::SetPriorityFilter(priority) => {
            state.filters.priority = priority;
            vec![]
        }
        Command::SetStatusFilter(status) => {
            state.filters.status = status;
            vec![]
        }
        Command::ClearFilters => {
            state.filters = TaskFilters::default();
            state.query.clear();
            vec![]
        }

        Command::ToggleSelect(id) => {
            state.selection.toggle(id);
            vec![]
        }
        Command::SelectAllVisible => {
            let visible: Vec<Uuid> = state.visible_tasks().iter().map(|task| task.id).collect();
            state.selection.select_all(&visible);
            vec![]
        }
        Command::ClearSelection => {
            state.selection.clear();
            vec![]
        }

        Command::OpenTaskForm => {
            state.form_open = true;
            state.form_errors = FormErrors::default();
            vec![]
        }
        Command::CloseTaskForm => {
            state.form_open = false;
            state.form_errors = FormErrors::default();
            vec![]
        }
        Command::SubmitTask(draft) => match draft.validate() {
            Ok(new_task) => {
                state.form_errors = FormErrors::default();
                vec![Effect::CreateTask(new_task)]
            }
            Err(errors) => {
                debug!(?errors, "task draft rejected");
                state.form_errors = errors;
                vec![]
            }
        },
        Command::TaskCreated(Ok(task)) => {
            info!(id = %task.id, "task created");
            state.tasks.insert(0, task);
            state.form_open = false;
            state.form_errors = FormErrors::default();
            vec![notify_success("Task created successfully")]
        }
        Command::TaskCreated(Err(err)) => {
            warn!(error = %err, "create failed");
            vec![notify_error("Failed to create task")]
        }

        Command::ToggleComplete(id) => {
            let Some(task) = state.task(id) else {
                debug!(%id, "toggle for unknown task");
                return vec![];
            };
            vec![Effect::UpdateTask {
                id,
                patch: TaskPatch::completion(!task.completed, now),
            }]
        }
        Command::TaskUpdated(Ok(task)) => {
            let was_completed = state.task(task.id).is_some_and(|prev| prev.completed);
            let newly_completed = task.completed && !was_completed;
            state.replace_task(task);
            if newly_completed {
                vec![notify_success("Task completed! 🎉")]
            } else {
                vec![]
            }
        }
        Command::TaskUpdated(Err(err)) => {
            warn!(error = %err, "update failed");
            vec![notify_error("Failed to update task")]
        }

        Command::DeleteTask(id) => {
            if state.task(id).is_none() {
                debug!(%id, "delete for unknown task");
                return vec![];
            }
            vec![Effect::DeleteTask(id)]
        }
        Command::TaskDeleted { id, result: Ok(_) } => {
            state.drop_task(id);
            vec![notify_success("Task deleted")]
        }
        Command::TaskDeleted { id, result: Err(err) } => {
            warn!(%id, error = %err, "delete failed");
            vec![notify_error("Failed to delete task")]
        }

        Command::BulkComplete => {
            if state.selection.is_empty() {
                return vec![];
            }
            let patches = state
                .selection
                .ids()
                .iter()
                .map(|id| (*id, TaskPatch::completion(true, now)))
                .collect();
            vec![Effect::CompleteMany(patches)]
        }
        Command::BulkCompleted(results) => {
            let mut confirmed = 0;
            let mut failed = 0;
            for (id, result) in results {
                match result {
                    Ok(task) => {
                        state.replace_task(task);
                        state.selection.remove(id);
                        confirmed += 1;
                    }
                    Err(err) => {
                        warn!(%id, error = %err, "bulk complete failed for task");
                        failed += 1;
                    }
                }
            }
            bulk_notices(confirmed, failed, "completed", "complete")
        }
        Command::BulkDelete => {
            if state.selection.is_empty() {
                return vec![];
            }
            vec![Effect::DeleteMany(state.selection.ids().to_vec())]
        }
        Command::BulkDeleted(results) => {
            let mut confirmed = 0;
            let mut failed = 0;
            for (id, result) in results {
                match result {
                    Ok(_) => {
                        state.drop_task(id);
                        confirmed += 1;
                    }
                    Err(err) => {
                        warn!(%id, error = %err, "bulk delete failed for task");
                        failed += 1;
                    }
                }
            }
            bulk_notices(confirmed, failed, "deleted", "delete")
        }
    }
}

fn bulk_notices(confirmed: usize, failed: usize, done: &str, verb: &str) -> Vec<Effect> {
    let mut effects = Vec::new();
    if confirmed > 0 {
        effects.push(notify_success(format!("{} {done}", tasks_phrase(confirmed))));
    }
    if failed > 0 {
        effects.push(notify_error(format!("Failed to {verb} {}", tasks_phrase(failed))));
    }
    effects
}

/// Owns the application state and executes effects against the stores.
pub struct Controller {
    stores: Stores,
    calendar: Calendar,
    state: AppState,
    notifications: Vec<Notification>,
}

impl Controller {
    pub fn new(stores: Stores, calendar: Calendar) -> Self {
        Self {
            stores,
            calendar,
            state: AppState::default(),
            notifications: Vec::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub async fn dispatch(&mut self, command: Command) {
        self.dispatch_at(command, Utc::now()).await;
    }

    /// Run `command` and every command its effects produce.
    #[tracing::instrument(skip(self, command, now), fields(command = command.name()))]
    pub async fn dispatch_at(&mut self, command: Command, now: DateTime<Utc>) {
        let mut queue = VecDeque::from([command]);
        while let Some(next) = queue.pop_front() {
            for effect in update(&mut self.state, next, now) {
                match effect {
                    Effect::Notify(notification) => {
                        debug!(level = ?notification.level, message = %notification.message, "notification");
                        self.notifications.push(notification);
                    }
                    effect => {
                        if let Some(result) = self.run(effect).await {
                            queue.push_back(result);
                        }
                    }
                }
            }
        }
    }

    async fn run(&self, effect: Effect) -> Option<Command> {
        let tasks = &self.stores.tasks;
        let command = match effect {
            Effect::FetchAll => {
                let fetched =
                    tokio::try_join!(tasks.get_all(), self.stores.categories.get_all());
                Command::Loaded(fetched)
            }
            Effect::CreateTask(new_task) => Command::TaskCreated(tasks.create(new_task).await),
            Effect::UpdateTask { id, patch } => Command::TaskUpdated(tasks.update(id, patch).await),
            Effect::DeleteTask(id) => Command::TaskDeleted {
                id,
                result: tasks.delete(id).await,
            },
            Effect::CompleteMany(patches) => {
                debug!(count = patches.len(), "completing tasks concurrently");
                let results = join_all(
                    patches
                        .into_iter()
                        .map(|(id, patch)| async move { (id, tasks.update(id, patch).await) }),
                )
                .await;
                Command::BulkCompleted(results)
            }
            Effect::DeleteMany(ids) => {
                debug!(count = ids.len(), "deleting tasks concurrently");
                let results = join_all(
                    ids.into_iter()
                        .map(|id| async move { (id, tasks.delete(id).await) }),
                )
                .await;
                Command::BulkDeleted(results)
            }
            // collected by dispatch_at
            Effect::Notify(_) => return None,
        };
        Some(command)
    }
}
