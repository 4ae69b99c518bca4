use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{CategoryStore, TaskStore};
use crate::category::{Category, CategoryPatch, NewCategory, default_categories};
use crate::error::{StoreError, StoreResult};
use crate::task::{NewTask, Task, TaskPatch};

/// Process-local store. Optional latency is applied before every call so
/// concurrent dispatch can be observed.
#[derive(Debug)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    categories: Mutex<Vec<Category>>,
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty task list, default categories.
    pub fn new() -> Self {
        let categories = default_categories().into_iter().map(Category::from_new).collect();
        Self::with_records(vec![], categories)
    }

    pub fn with_records(tasks: Vec<Task>, categories: Vec<Category>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            categories: Mutex::new(categories),
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        self.pause().await;
        Ok(self.tasks.lock().clone())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Task> {
        self.pause().await;
        self.tasks
            .lock()
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .ok_or(StoreError::task_not_found(id))
    }

    async fn create(&self, data: NewTask) -> StoreResult<Task> {
        self.pause().await;
        let task = Task::from_new(data, Utc::now());
        debug!(id = %task.id, "memory store created task");
        self.tasks.lock().insert(0, task.clone());
        Ok(task)
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task> {
        self.pause().await;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(StoreError::task_not_found(id))?;
        task.apply_patch(patch, Utc::now());
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.pause().await;
        let mut tasks = self.tasks.lock();
        let idx = tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(StoreError::task_not_found(id))?;
        tasks.remove(idx);
        Ok(true)
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        self.pause().await;
        Ok(self.categories.lock().clone())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Category> {
        self.pause().await;
        self.categories
            .lock()
            .iter()
            .find(|category| category.id == id)
            .cloned()
            .ok_or(StoreError::category_not_found(id))
    }

    async fn create(&self, data: NewCategory) -> StoreResult<Category> {
        self.pause().await;
        let category = Category::from_new(data);
        self.categories.lock().push(category.clone());
        Ok(category)
    }

    async fn update(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category> {
        self.pause().await;
        let mut categories = self.categories.lock();
        let category = categories
            .iter_mut()
            .find(|category| category.id == id)
            .ok_or(StoreError::category_not_found(id))?;
        category.apply_patch(patch);
        Ok(category.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.pause().await;
        let mut categories = self.categories.lock();
        let idx = categories
            .iter()
            .position(|category| category.id == id)
            .ok_or(StoreError::category_not_found(id))?;
        categories.remove(idx);
        Ok(true)
    }
}
