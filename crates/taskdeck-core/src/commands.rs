use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::CliCommand;
use crate::controller::{Command, Controller, NoticeLevel, Phase};
use crate::datetime::parse_due_date;
use crate::filter::{CategoryFilter, PriorityFilter, StatusFilter};
use crate::render::Renderer;
use crate::task::{Priority, Task};

/// Load the store, run one CLI command through the controller, then report
/// notifications. Any error notification fails the command.
#[instrument(skip(controller, renderer, command), fields(command = command.name()))]
pub async fn dispatch(
    controller: &mut Controller,
    renderer: &Renderer,
    command: CliCommand,
) -> anyhow::Result<()> {
    let now = Utc::now();

    controller.dispatch_at(Command::Load, now).await;
    if let Phase::Error(message) = &controller.state().phase {
        let message = message.clone();
        renderer.print_notifications(&controller.take_notifications())?;
        return Err(anyhow!("could not load tasks: {message}"));
    }

    debug!(command = command.name(), "dispatching command");
    match command {
        CliCommand::List {
            search,
            category,
            priority,
            status,
        } => cmd_list(controller, renderer, search, category, priority, status, now).await?,
        CliCommand::Add {
            title,
            description,
            category,
            priority,
            due,
        } => cmd_add(controller, title, description, category, priority, due, now).await?,
        CliCommand::Toggle { id } => {
            let id = resolve_task_id(&controller.state().tasks, &id)?;
            controller.dispatch_at(Command::ToggleComplete(id), now).await;
        }
        CliCommand::Delete { id } => {
            let id = resolve_task_id(&controller.state().tasks, &id)?;
            controller.dispatch_at(Command::DeleteTask(id), now).await;
        }
        CliCommand::Complete { ids } => {
            select_ids(controller, &ids, now).await?;
            controller.dispatch_at(Command::BulkComplete, now).await;
        }
        CliCommand::Remove { ids } => {
            select_ids(controller, &ids, now).await?;
            controller.dispatch_at(Command::BulkDelete, now).await;
        }
        CliCommand::Stats => {
            renderer.print_stats(controller.state(), &controller.calendar(), now)?;
        }
        CliCommand::Categories => renderer.print_categories(controller.state())?,
    }

    report(controller, renderer)
}

fn report(controller: &mut Controller, renderer: &Renderer) -> anyhow::Result<()> {
    let notifications = controller.take_notifications();
    renderer.print_notifications(&notifications)?;

    let failures = notifications
        .iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .count();
    if failures > 0 {
        return Err(anyhow!(
            "{failures} store operation{} failed",
            if failures == 1 { "" } else { "s" }
        ));
    }
    Ok(())
}

#[instrument(skip(controller, renderer, now))]
async fn cmd_list(
    controller: &mut Controller,
    renderer: &Renderer,
    search: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    if let Some(query) = search {
        controller.dispatch_at(Command::SetQuery(query), now).await;
    }
    if let Some(raw) = category {
        let filter = CategoryFilter::from_str(&raw)?;
        controller.dispatch_at(Command::SetCategoryFilter(filter), now).await;
    }
    if let Some(raw) = priority {
        let filter = PriorityFilter::from_str(&raw)?;
        controller.dispatch_at(Command::SetPriorityFilter(filter), now).await;
    }
    if let Some(raw) = status {
        let filter = StatusFilter::from_str(&raw)?;
        controller.dispatch_at(Command::SetStatusFilter(filter), now).await;
    }

    renderer.print_list(controller.state(), &controller.calendar(), now)
}

#[instrument(skip(controller, title, description, now))]
async fn cmd_add(
    controller: &mut Controller,
    title: Vec<String>,
    description: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    due: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let mut draft = controller.state().new_draft();
    draft.title = title.join(" ");
    draft.description = description.unwrap_or_default();
    if let Some(category) = category {
        draft.category = category;
    }
    if let Some(raw) = priority {
        draft.priority = Priority::from_str(&raw)?;
    }
    if let Some(expr) = due {
        let today = controller.calendar().today(now);
        draft.due_date = Some(
            parse_due_date(&expr, today).with_context(|| format!("invalid --due value {expr:?}"))?,
        );
    }

    let newest_before = controller.state().tasks.first().map(|task| task.id);
    controller.dispatch_at(Command::OpenTaskForm, now).await;
    controller.dispatch_at(Command::SubmitTask(draft), now).await;

    if let Some(message) = &controller.state().form_errors.title {
        return Err(anyhow!("{message}"));
    }

    if let Some(created) = controller.state().tasks.first()
        && Some(created.id) != newest_before
    {
        debug!(id = %created.id, "task added");
        println!("Created task {}.", created.short_id());
    }
    Ok(())
}

/// Replace the selection with the tasks named by `tokens`.
async fn select_ids(
    controller: &mut Controller,
    tokens: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut ids: Vec<Uuid> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let id = resolve_task_id(&controller.state().tasks, token)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    controller.dispatch_at(Command::ClearSelection, now).await;
    for id in ids {
        controller.dispatch_at(Command::ToggleSelect(id), now).await;
    }
    Ok(())
}

/// Match `token` against task ids: a full UUID, or a unique prefix of its
/// hyphen-free form.
pub fn resolve_task_id(tasks: &[Task], token: &str) -> anyhow::Result<Uuid> {
    let needle = token.trim().to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    let mut matches = tasks
        .iter()
        .map(|task| task.id)
        .filter(|id| id.simple().to_string().starts_with(&needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {token}"))?;
    let extra = matches.count();
    if extra > 0 {
        return Err(anyhow!(
            "id {token} is ambiguous ({} tasks match)",
            extra + 1
        ));
    }
    Ok(first)
}
