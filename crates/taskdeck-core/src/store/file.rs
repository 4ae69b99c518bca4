use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CategoryStore, TaskStore};
use crate::category::{Category, CategoryPatch, NewCategory, default_categories};
use crate::error::{StoreError, StoreResult};
use crate::task::{NewTask, Task, TaskPatch};

const TASKS_FILE: &str = "tasks.data";
const CATEGORIES_FILE: &str = "categories.data";

/// JSON-lines store, one file per collection. Every write rewrites the
/// whole collection through a temp file and an atomic rename.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub categories_path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        let categories_path = data_dir.join(CATEGORIES_FILE);

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        let existing: Vec<Category> = load_jsonl(&categories_path)
            .with_context(|| format!("failed to load {}", categories_path.display()))?;
        if existing.is_empty() {
            let seeded: Vec<Category> = default_categories()
                .into_iter()
                .map(Category::from_new)
                .collect();
            save_jsonl_atomic(&categories_path, &seeded)
                .with_context(|| format!("failed to seed {}", categories_path.display()))?;
            info!(count = seeded.len(), "seeded default categories");
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            categories = %categories_path.display(),
            "opened file store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            categories_path,
            lock: Mutex::new(()),
        })
    }

    /// Load, edit and save one collection under the store lock.
    fn rewrite<T, R>(
        &self,
        path: &Path,
        edit: impl FnOnce(&mut Vec<T>) -> StoreResult<R>,
    ) -> StoreResult<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock.lock();
        let mut records = load_jsonl(path)?;
        let out = edit(&mut records)?;
        save_jsonl_atomic(path, &records)?;
        Ok(out)
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        let _guard = self.lock.lock();
        load_jsonl(path)
    }
}

#[async_trait]
impl TaskStore for FileStore {
    #[tracing::instrument(skip(self))]
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        self.read(&self.tasks_path)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Task> {
        self.read::<Task>(&self.tasks_path)?
            .into_iter()
            .find(|task| task.id == id)
            .ok_or(StoreError::task_not_found(id))
    }

    #[tracing::instrument(skip(self, data), fields(title = %data.title))]
    async fn create(&self, data: NewTask) -> StoreResult<Task> {
        let task = Task::from_new(data, Utc::now());
        self.rewrite(&self.tasks_path, |tasks: &mut Vec<Task>| {
            tasks.insert(0, task.clone());
            Ok(())
        })?;
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task> {
        self.rewrite(&self.tasks_path, |tasks: &mut Vec<Task>| {
            let task = tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or(StoreError::task_not_found(id))?;
            task.apply_patch(patch, Utc::now());
            Ok(task.clone())
        })
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.rewrite(&self.tasks_path, |tasks: &mut Vec<Task>| {
            let idx = tasks
                .iter()
                .position(|task| task.id == id)
                .ok_or(StoreError::task_not_found(id))?;
            tasks.remove(idx);
            Ok(true)
        })
    }
}

#[async_trait]
impl CategoryStore for FileStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        self.read(&self.categories_path)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Category> {
        self.read::<Category>(&self.categories_path)?
            .into_iter()
            .find(|category| category.id == id)
            .ok_or(StoreError::category_not_found(id))
    }

    async fn create(&self, data: NewCategory) -> StoreResult<Category> {
        let category = Category::from_new(data);
        self.rewrite(&self.categories_path, |categories: &mut Vec<Category>| {
            categories.push(category.clone());
            Ok(())
        })?;
        Ok(category)
    }

    async fn update(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category> {
        self.rewrite(&self.categories_path, |categories: &mut Vec<Category>| {
            let category = categories
                .iter_mut()
                .find(|category| category.id == id)
                .ok_or(StoreError::category_not_found(id))?;
            category.apply_patch(patch);
            Ok(category.clone())
        })
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.rewrite(&self.categories_path, |categories: &mut Vec<Category>| {
            let idx = categories
                .iter()
                .position(|category| category.id == id)
                .ok_or(StoreError::category_not_found(id))?;
            categories.remove(idx);
            Ok(true)
        })
    }
}

fn load_jsonl<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    if !path.exists() {
        return Ok(vec![]);
    }
    let reader = BufReader::new(fs::File::open(path)?);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|err| {
            StoreError::Unavailable(format!(
                "failed parsing {} line {}: {err}",
                path.display(),
                idx + 1
            ))
        })?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records");
    Ok(out)
}

fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> StoreResult<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path).map_err(|err| {
        StoreError::Unavailable(format!("failed to persist {}: {}", path.display(), err))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::FileStore;
    use crate::error::StoreError;
    use crate::store::{CategoryStore, TaskStore};
    use crate::task::{NewTask, Priority, TaskPatch};

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: Some("notes".to_string()),
            category: "Personal".to_string(),
            priority: Priority::Low,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn open_seeds_categories_once() {
        let dir = tempdir().unwrap();
        let first = FileStore::open(dir.path()).unwrap();
        let seeded = CategoryStore::get_all(&first).await.unwrap();
        assert_eq!(seeded.len(), 4);

        let again = FileStore::open(dir.path()).unwrap();
        let reloaded = CategoryStore::get_all(&again).await.unwrap();
        assert_eq!(seeded, reloaded);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let older = TaskStore::create(&store, new_task("older")).await.unwrap();
        let newer = TaskStore::create(&store, new_task("newer")).await.unwrap();
        TaskStore::update(&store, older.id, TaskPatch::completion(true, older.created_at))
            .await
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let tasks = TaskStore::get_all(&reopened).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, newer.id);
        assert!(tasks[1].completed);
        assert!(tasks[1].completed_at.is_some());
    }

    #[tokio::test]
    async fn malformed_line_reports_unavailable() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(&store.tasks_path, "{not json}\n").unwrap();

        let err = TaskStore::get_all(&store).await.unwrap_err();
        match err {
            StoreError::Unavailable(msg) => assert!(msg.contains("line 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_missing_task_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let task = TaskStore::create(&store, new_task("gone")).await.unwrap();
        assert!(TaskStore::delete(&store, task.id).await.unwrap());
        assert_eq!(
            TaskStore::delete(&store, task.id).await.unwrap_err(),
            StoreError::task_not_found(task.id)
        );
    }
}
