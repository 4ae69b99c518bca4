//! Persistence seam for tasks and categories.
//!
//! The controller only ever talks to [`TaskStore`] and [`CategoryStore`];
//! which implementation sits behind them is decided once, in
//! [`open_stores`], from the `store.backend` config key.

pub mod file;
pub mod memory;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::category::{Category, CategoryPatch, NewCategory};
use crate::config::{self, Config};
use crate::error::StoreResult;
use crate::task::{NewTask, Task, TaskPatch};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Task CRUD. Each call is atomic for the record it touches and nothing more.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_all(&self) -> StoreResult<Vec<Task>>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Task>;

    /// Assigns `id` and `created_at`; the new task starts pending.
    async fn create(&self, data: NewTask) -> StoreResult<Task>;

    /// Merges only the fields present in `patch`.
    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_all(&self) -> StoreResult<Vec<Category>>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Category>;

    async fn create(&self, data: NewCategory) -> StoreResult<Category>;

    async fn update(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Handles the controller holds for the lifetime of a session.
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<dyn TaskStore>,
    pub categories: Arc<dyn CategoryStore>,
}

impl Stores {
    pub fn new(tasks: Arc<dyn TaskStore>, categories: Arc<dyn CategoryStore>) -> Self {
        Self { tasks, categories }
    }

    /// Both handles backed by one value implementing both traits.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TaskStore + CategoryStore + 'static,
    {
        Self {
            tasks: store.clone(),
            categories: store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "file" | "jsonl" => Ok(StoreBackend::File),
            other => Err(anyhow!("unknown store backend: {other} (expected file or memory)")),
        }
    }
}

impl StoreBackend {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        cfg.get("store.backend")
            .unwrap_or_else(|| "file".to_string())
            .parse()
    }
}

#[tracing::instrument(skip(cfg, data_override))]
pub fn open_stores(cfg: &Config, data_override: Option<&Path>) -> anyhow::Result<Stores> {
    let backend = StoreBackend::from_config(cfg)?;
    info!(?backend, "opening store");

    match backend {
        StoreBackend::Memory => {
            let mut store = MemoryStore::new();
            let latency = cfg.get_u64("store.latency")?.unwrap_or(0);
            if latency > 0 {
                store = store.with_latency(Duration::from_millis(latency));
            }
            Ok(Stores::shared(Arc::new(store)))
        }
        StoreBackend::File => {
            let data_dir = config::resolve_data_dir(cfg, data_override)
                .context("failed to resolve data directory")?;
            let store = FileStore::open(&data_dir)
                .with_context(|| format!("failed to open store at {}", data_dir.display()))?;
            Ok(Stores::shared(Arc::new(store)))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{CategoryStore, StoreBackend, TaskStore, open_stores};
    use crate::config::Config;

    #[test]
    fn parses_backend_names() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("FILE".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[tokio::test]
    async fn memory_backend_comes_seeded() {
        let mut cfg = Config::with_defaults();
        cfg.apply_overrides([("store.backend".to_string(), "memory".to_string())]);
        let stores = open_stores(&cfg, None).expect("open memory store");

        assert!(stores.tasks.get_all().await.unwrap().is_empty());
        assert!(!stores.categories.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backend_uses_data_override() {
        let dir = tempdir().unwrap();
        let cfg = Config::with_defaults();
        let stores = open_stores(&cfg, Some(dir.path())).expect("open file store");

        assert!(stores.tasks.get_all().await.unwrap().is_empty());
        assert!(dir.path().join("tasks.data").exists());
    }
}
