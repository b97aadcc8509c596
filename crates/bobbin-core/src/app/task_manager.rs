//! Task manager: owns the task catalog and the task state machine.
//!
//! Like the lease manager, every public operation holds one mutex for its
//! whole duration, covering the cache and all task-store access. Leasing is
//! delegated to the `LeaseManager` through its public API; the lock order is
//! always task catalog -> lease catalog, never the reverse.
//!
//! Cache rules:
//! - `get_task`, `update_task`, `complete_task` and `lease_task` fall back to
//!   the store when the id is not cached, and cache what they load.
//! - `complete_task` evicts the task after persisting it.
//! - `delete_task` only knows the cache: an id that is on disk but not cached
//!   is reported as not found until something loads it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::lease_manager::LeaseManager;
use super::status::TaskCounts;
use crate::config::DEFAULT_LEASE_DURATION;
use crate::domain::{BobbinError, Lease, Task, TaskId, TaskState};
use crate::ports::{Clock, Entity, EntityStore, IdGenerator};

/// Outcome of one `delete_older_tasks` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReapReport {
    pub scanned: usize,
    pub deleted: usize,
    /// Records that could not be read or deleted; they are retried next pass.
    pub failed: usize,
}

pub struct TaskManager {
    tasks: Mutex<HashMap<TaskId, Task>>,
    store: Arc<dyn EntityStore<Task>>,
    /// Second write path for leases granted through `lease_task`.
    lease_store: Arc<dyn EntityStore<Lease>>,
    leases: Arc<LeaseManager>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    lease_duration: Duration,
}

impl TaskManager {
    pub fn new(
        store: Arc<dyn EntityStore<Task>>,
        lease_store: Arc<dyn EntityStore<Lease>>,
        leases: Arc<LeaseManager>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            store,
            lease_store,
            leases,
            clock,
            ids,
            lease_duration: to_chrono(DEFAULT_LEASE_DURATION),
        }
    }

    /// Duration granted by `lease_task` (3 minutes unless overridden).
    pub fn with_lease_duration(mut self, duration: std::time::Duration) -> Self {
        self.lease_duration = to_chrono(duration);
        self
    }

    pub fn lease_manager(&self) -> &Arc<LeaseManager> {
        &self.leases
    }

    /// Load every task record into the cache. Any unreadable record fails.
    pub async fn load_tasks(&self) -> Result<usize, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let loaded = self.store.load_all().await?;
        let count = loaded.len();
        for task in loaded {
            tasks.insert(task.id, task);
        }
        tracing::info!(loaded = count, "tasks loaded");
        Ok(count)
    }

    pub async fn create_task(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        payload: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<Task, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let task = Task::new(
            self.ids.generate_task_id(),
            name,
            description,
            payload,
            metadata,
            self.clock.now(),
        );

        self.store.save(&task).await?;
        tasks.insert(task.id, task.clone());

        tracing::info!(task_id = %task.id, name = %task.name, "task created");
        Ok(task)
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Task, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        self.resolve(&mut tasks, task_id).await.cloned()
    }

    /// Overwrite state and payload. The transition itself is not validated.
    pub async fn update_task(
        &self,
        task_id: TaskId,
        state: TaskState,
        payload: Vec<u8>,
    ) -> Result<Task, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let mut updated = self.resolve(&mut tasks, task_id).await?.clone();
        updated.apply_update(state, payload, self.clock.now());

        self.store.save(&updated).await?;
        tasks.insert(task_id, updated.clone());

        tracing::info!(task_id = %task_id, state = %state, "task updated");
        Ok(updated)
    }

    /// Force the task to `completed`, persist it, then drop it from the cache.
    ///
    /// Any lease on the task is left alone; it runs out on its own.
    pub async fn complete_task(&self, task_id: TaskId) -> Result<Task, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let mut completed = self.resolve(&mut tasks, task_id).await?.clone();
        completed.mark_completed(self.clock.now());

        self.store.save(&completed).await?;
        tasks.remove(&task_id);

        tracing::info!(task_id = %task_id, "task completed");
        Ok(completed)
    }

    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.get(&task_id) else {
            return Err(BobbinError::TaskNotFound(task_id));
        };

        self.store.delete(&task.key()).await?;
        tasks.remove(&task_id);

        tracing::info!(task_id = %task_id, "task deleted");
        Ok(())
    }

    /// Any cached task still in `created`. No ordering is promised.
    ///
    /// A `leased` task whose lease ran out is not offered again here; a worker
    /// that knows its id can re-lease it with `lease_task`.
    pub async fn get_unleased_task(&self) -> Result<Task, BobbinError> {
        let tasks = self.tasks.lock().await;
        tasks
            .values()
            .find(|task| task.state == TaskState::Created)
            .cloned()
            .ok_or(BobbinError::NoUnleasedTask)
    }

    /// Lease the task to `owner` for the configured duration.
    ///
    /// The lease is committed by the lease manager, then written again through
    /// this manager's own lease store, then a `created` task moves to
    /// `leased`. There is no rollback: if a later step fails the lease stays.
    /// An `extend_lease` landing between the two lease writes is overwritten
    /// on disk by the shorter record written here.
    pub async fn lease_task(&self, task_id: TaskId, owner: &str) -> Result<Lease, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let state = self.resolve(&mut tasks, task_id).await?.state;

        let lease = self
            .leases
            .acquire_lease(task_id, self.lease_duration, owner)
            .await?;
        self.lease_store.save(&lease).await?;

        if state == TaskState::Created
            && let Some(task) = tasks.get(&task_id)
        {
            let mut leased = task.clone();
            leased.mark_leased(self.clock.now());
            self.store.save(&leased).await?;
            tasks.insert(task_id, leased);
        }

        Ok(lease)
    }

    /// Delete every task on disk created strictly before `threshold`.
    ///
    /// Reads the store, not the cache. A record that cannot be read or removed
    /// is logged and counted; only a failure to list the store fails the call.
    pub async fn delete_older_tasks(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<ReapReport, BobbinError> {
        let mut tasks = self.tasks.lock().await;
        let mut report = ReapReport::default();

        for key in self.store.list_keys().await? {
            report.scanned += 1;
            let task = match self.store.load(&key).await {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable task record");
                    report.failed += 1;
                    continue;
                }
            };
            if task.created_at >= threshold {
                continue;
            }
            match self.store.delete(&key).await {
                Ok(()) => {
                    tasks.remove(&task.id);
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to delete old task");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            threshold = %threshold,
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "old tasks purged"
        );
        Ok(report)
    }

    /// Counts of cached tasks per state.
    pub async fn counts_by_state(&self) -> TaskCounts {
        let tasks = self.tasks.lock().await;
        TaskCounts::from_states(tasks.values().map(|task| task.state))
    }

    pub async fn is_cached(&self, task_id: TaskId) -> bool {
        self.tasks.lock().await.contains_key(&task_id)
    }

    async fn resolve<'a>(
        &self,
        tasks: &'a mut HashMap<TaskId, Task>,
        task_id: TaskId,
    ) -> Result<&'a mut Task, BobbinError> {
        if !tasks.contains_key(&task_id) {
            let loaded = self
                .store
                .load(&task_id.to_string())
                .await?
                .ok_or(BobbinError::TaskNotFound(task_id))?;
            tracing::debug!(task_id = %task_id, "task loaded from store");
            tasks.insert(task_id, loaded);
        }
        tasks
            .get_mut(&task_id)
            .ok_or(BobbinError::TaskNotFound(task_id))
    }
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
