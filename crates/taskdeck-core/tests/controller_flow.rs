use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taskdeck_core::controller::{Command, Controller, NoticeLevel, Phase, TaskDraft};
use taskdeck_core::datetime::Calendar;
use taskdeck_core::error::{StoreError, StoreResult};
use taskdeck_core::store::{CategoryStore, MemoryStore, Stores, TaskStore};
use taskdeck_core::task::{NewTask, Priority, Task, TaskPatch};
use uuid::Uuid;

/// Wraps a memory store, failing mutations for chosen ids and counting
/// every call that reaches it.
struct FlakyStore {
    inner: MemoryStore,
    failing: parking_lot::Mutex<HashSet<Uuid>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: parking_lot::Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn fail_on(&self, id: Uuid) {
        self.failing.lock().insert(id);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, id: Option<Uuid>) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("offline".to_string()));
        }
        match id {
            Some(id) if self.failing.lock().contains(&id) => {
                Err(StoreError::Unavailable(format!("injected failure for {id}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        self.check(None)?;
        TaskStore::get_all(&self.inner).await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Task> {
        self.check(Some(id))?;
        TaskStore::get_by_id(&self.inner, id).await
    }

    async fn create(&self, data: NewTask) -> StoreResult<Task> {
        self.check(None)?;
        TaskStore::create(&self.inner, data).await
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task> {
        self.check(Some(id))?;
        TaskStore::update(&self.inner, id, patch).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.check(Some(id))?;
        TaskStore::delete(&self.inner, id).await
    }
}

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        category: "Work".to_string(),
        priority: Priority::Medium,
        due_date: None,
    }
}

async fn seeded(titles: &[&str]) -> (Arc<FlakyStore>, Vec<Task>) {
    let inner = MemoryStore::new();
    let mut created = Vec::new();
    for title in titles {
        created.push(TaskStore::create(&inner, new_task(title)).await.expect("seed"));
    }
    (Arc::new(FlakyStore::new(inner)), created)
}

async fn ready_controller(store: Arc<FlakyStore>) -> Controller {
    let categories: Arc<dyn CategoryStore> = Arc::new(MemoryStore::new());
    let mut controller = Controller::new(Stores::new(store, categories), Calendar::default());
    controller.dispatch(Command::Load).await;
    assert_eq!(controller.state().phase, Phase::Ready);
    controller
}

#[tokio::test]
async fn bulk_complete_keeps_failed_task_selected() {
    let (store, tasks) = seeded(&["a", "b", "c"]).await;
    let failing = tasks[1].id;
    store.fail_on(failing);
    let mut controller = ready_controller(store.clone()).await;

    controller.dispatch(Command::SelectAllVisible).await;
    controller.dispatch(Command::BulkComplete).await;

    let state = controller.state();
    for task in &tasks {
        let cached = state.task(task.id).expect("still listed");
        assert_eq!(cached.completed, task.id != failing, "task {}", task.title);
    }
    assert_eq!(state.selection.ids(), &[failing]);

    let persisted = TaskStore::get_all(store.as_ref()).await.expect("reload");
    assert_eq!(persisted.iter().filter(|t| t.completed).count(), 2);

    let messages: Vec<String> = controller
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(messages, vec!["2 tasks completed", "Failed to complete 1 task"]);
}

#[tokio::test]
async fn bulk_delete_keeps_failed_task_listed_and_selected() {
    let (store, tasks) = seeded(&["a", "b", "c"]).await;
    let failing = tasks[1].id;
    store.fail_on(failing);
    let mut controller = ready_controller(store.clone()).await;

    controller.dispatch(Command::SelectAllVisible).await;
    controller.dispatch(Command::BulkDelete).await;

    let state = controller.state();
    let listed: Vec<Uuid> = state.tasks.iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![failing]);
    assert_eq!(state.selection.ids(), &[failing]);

    let persisted = TaskStore::get_all(&store.inner).await.expect("reload");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, failing);

    let messages: Vec<String> = controller
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(messages, vec!["2 tasks deleted", "Failed to delete 1 task"]);
}

#[tokio::test]
async fn failed_delete_leaves_list_unchanged() {
    let (store, tasks) = seeded(&["stubborn", "other"]).await;
    store.fail_on(tasks[0].id);
    let mut controller = ready_controller(store).await;

    controller.dispatch(Command::DeleteTask(tasks[0].id)).await;

    assert_eq!(controller.state().tasks.len(), 2);
    assert!(controller.state().task(tasks[0].id).is_some());
    let notices = controller.take_notifications();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].message, "Failed to delete task");
}

#[tokio::test]
async fn blank_title_never_reaches_store() {
    let (store, _) = seeded(&[]).await;
    let mut controller = ready_controller(store.clone()).await;
    let calls_after_load = store.calls();

    let draft = TaskDraft {
        title: "  \t ".to_string(),
        ..controller.state().new_draft()
    };
    controller.dispatch(Command::SubmitTask(draft)).await;

    assert_eq!(store.calls(), calls_after_load);
    assert_eq!(
        controller.state().form_errors.title.as_deref(),
        Some("Title is required")
    );
    assert!(controller.take_notifications().is_empty());
}

#[tokio::test]
async fn submitted_task_is_prepended() {
    let (store, tasks) = seeded(&["existing"]).await;
    let mut controller = ready_controller(store).await;

    let draft = TaskDraft {
        title: "  Plan trip ".to_string(),
        description: "flights, hotel".to_string(),
        ..controller.state().new_draft()
    };
    controller.dispatch(Command::SubmitTask(draft)).await;

    let state = controller.state();
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.tasks[0].title, "Plan trip");
    assert_eq!(state.tasks[1].id, tasks[0].id);
    assert!(state.form_errors.is_empty());
}

#[tokio::test]
async fn deleting_selected_task_updates_list_and_selection() {
    let (store, tasks) = seeded(&["keep", "drop"]).await;
    let mut controller = ready_controller(store).await;
    let doomed = tasks[1].id;

    controller.dispatch(Command::ToggleSelect(doomed)).await;
    controller.dispatch(Command::ToggleSelect(tasks[0].id)).await;
    controller.dispatch(Command::DeleteTask(doomed)).await;

    let state = controller.state();
    assert!(state.task(doomed).is_none());
    assert_eq!(state.selection.ids(), &[tasks[0].id]);
    let notices = controller.take_notifications();
    assert_eq!(notices[0].message, "Task deleted");
}

#[tokio::test]
async fn failed_toggle_leaves_cache_untouched() {
    let (store, tasks) = seeded(&["stubborn"]).await;
    store.fail_on(tasks[0].id);
    let mut controller = ready_controller(store).await;

    controller.dispatch(Command::ToggleComplete(tasks[0].id)).await;

    assert!(!controller.state().tasks[0].completed);
    let notices = controller.take_notifications();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].message, "Failed to update task");
}

#[tokio::test]
async fn load_failure_enters_error_phase_then_retry_recovers() {
    let (store, tasks) = seeded(&["survivor"]).await;
    store.set_offline(true);
    let categories: Arc<dyn CategoryStore> = Arc::new(MemoryStore::new());
    let mut controller = Controller::new(Stores::new(store.clone(), categories), Calendar::default());

    controller.dispatch(Command::Load).await;
    assert!(matches!(controller.state().phase, Phase::Error(_)));
    assert!(controller.state().tasks.is_empty());
    assert_eq!(
        controller.take_notifications()[0].message,
        "Failed to load data"
    );

    controller.dispatch(Command::ToggleComplete(tasks[0].id)).await;
    assert!(controller.take_notifications().is_empty());

    store.set_offline(false);
    controller.dispatch(Command::Retry).await;
    assert_eq!(controller.state().phase, Phase::Ready);
    assert_eq!(controller.state().tasks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn bulk_calls_run_concurrently() {
    let latency = Duration::from_millis(200);
    let store = Arc::new(MemoryStore::new().with_latency(latency));
    for title in ["a", "b", "c", "d"] {
        TaskStore::create(store.as_ref(), new_task(title)).await.expect("seed");
    }
    let mut controller = Controller::new(Stores::shared(store), Calendar::default());
    controller.dispatch(Command::Load).await;
    controller.dispatch(Command::SelectAllVisible).await;

    let started = tokio::time::Instant::now();
    controller.dispatch(Command::BulkDelete).await;
    let elapsed = started.elapsed();

    assert!(controller.state().tasks.is_empty());
    assert!(controller.state().selection.is_empty());
    assert!(elapsed < latency * 2, "bulk delete took {elapsed:?}");
}
