//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() は lease → task の順に永続レコードを全件ロードする
//! - どちらかが失敗したら BuildError を返し、起動を中止する
//!
//! # 使用例
//! ```ignore
//! let app = AppBuilder::new(BobbinConfig::new("/var/lib/bobbin"))
//!     .build()
//!     .await?;
//! let background = app.spawn_background();
//! ```

use std::sync::Arc;

use super::background::BackgroundGroup;
use super::lease_manager::LeaseManager;
use super::reaper_loop::ReaperLoop;
use super::status::StatusSnapshot;
use super::sweep_loop::LeaseSweepLoop;
use super::task_manager::TaskManager;
use crate::config::BobbinConfig;
use crate::domain::{BobbinError, Lease, Task};
use crate::impls::JsonFileStore;
use crate::ports::{Clock, EntityStore, IdGenerator, SystemClock, UlidGenerator};

/// BuildError は起動時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to load leases: {0}")]
    LoadLeases(#[source] BobbinError),

    #[error("failed to load tasks: {0}")]
    LoadTasks(#[source] BobbinError),
}

pub struct AppBuilder {
    config: BobbinConfig,
    clock: Option<Arc<dyn Clock>>,
    task_store: Option<Arc<dyn EntityStore<Task>>>,
    lease_store: Option<Arc<dyn EntityStore<Lease>>>,
}

impl AppBuilder {
    pub fn new(config: BobbinConfig) -> Self {
        Self {
            config,
            clock: None,
            task_store: None,
            lease_store: None,
        }
    }

    /// Defaults to `SystemClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a `JsonFileStore` over `<data_dir>/tasks`.
    pub fn task_store(mut self, store: Arc<dyn EntityStore<Task>>) -> Self {
        self.task_store = Some(store);
        self
    }

    /// Defaults to a `JsonFileStore` over `<data_dir>/leases`.
    pub fn lease_store(mut self, store: Arc<dyn EntityStore<Lease>>) -> Self {
        self.lease_store = Some(store);
        self
    }

    /// Wire the managers and recover persisted state.
    pub async fn build(self) -> Result<App, BuildError> {
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let task_store: Arc<dyn EntityStore<Task>> = match self.task_store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::<Task>::new(self.config.tasks_dir())),
        };
        let lease_store: Arc<dyn EntityStore<Lease>> = match self.lease_store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::<Lease>::new(self.config.leases_dir())),
        };

        let leases = Arc::new(LeaseManager::new(
            lease_store.clone(),
            clock.clone(),
            ids.clone(),
        ));
        leases.load_leases().await.map_err(BuildError::LoadLeases)?;

        let tasks = Arc::new(
            TaskManager::new(task_store, lease_store, leases.clone(), clock.clone(), ids)
                .with_lease_duration(self.config.lease_duration),
        );
        tasks.load_tasks().await.map_err(BuildError::LoadTasks)?;

        Ok(App {
            config: self.config,
            tasks,
            leases,
            clock,
        })
    }
}

/// Wired managers plus what the background loops need.
pub struct App {
    pub config: BobbinConfig,
    pub tasks: Arc<TaskManager>,
    pub leases: Arc<LeaseManager>,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn reaper(&self) -> ReaperLoop {
        ReaperLoop::new(
            self.tasks.clone(),
            self.clock.clone(),
            self.config.retention,
            self.config.reap_interval,
        )
    }

    pub fn lease_sweeper(&self) -> LeaseSweepLoop {
        LeaseSweepLoop::new(self.leases.clone(), self.config.lease_sweep_interval)
    }

    /// Start the reaper and the lease sweeper.
    pub fn spawn_background(&self) -> BackgroundGroup {
        let mut group = BackgroundGroup::new();
        group.push(self.reaper().spawn(group.shutdown_signal()));
        group.push(self.lease_sweeper().spawn(group.shutdown_signal()));
        group
    }

    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            tasks: self.tasks.counts_by_state().await,
            leases: self.leases.counts().await,
        }
    }
}
