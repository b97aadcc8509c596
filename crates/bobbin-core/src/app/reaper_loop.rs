//! ReaperLoop - 古いタスクの定期削除
//!
//! # フロー
//! 1. `interval` ごとに起きる
//! 2. threshold = now - retention を計算
//! 3. TaskManager::delete_older_tasks(threshold)
//!
//! A failed pass is logged; the next tick tries again from scratch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::background::run_periodic;
use super::task_manager::{ReapReport, TaskManager};
use crate::domain::BobbinError;
use crate::ports::Clock;

pub struct ReaperLoop {
    tasks: Arc<TaskManager>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(
        tasks: Arc<TaskManager>,
        clock: Arc<dyn Clock>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            tasks,
            clock,
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
            interval,
        }
    }

    /// One reaping pass against the current clock.
    pub async fn run_once(&self) -> Result<ReapReport, BobbinError> {
        let threshold = self
            .clock
            .now()
            .checked_sub_signed(self.retention)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        self.tasks.delete_older_tasks(threshold).await
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = Arc::new(self);
        let interval = this.interval;
        run_periodic("reaper", interval, shutdown, move || {
            let this = Arc::clone(&this);
            async move {
                if let Err(e) = this.run_once().await {
                    tracing::error!(error = %e, "reaper pass failed");
                }
            }
        })
        .await;
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::LeaseManager;
    use crate::app::background::BackgroundGroup;
    use crate::domain::{Lease, Task};
    use crate::impls::InMemoryEntityStore;
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn managers(clock: Arc<FixedClock>) -> Arc<TaskManager> {
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let lease_store = Arc::new(InMemoryEntityStore::<Lease>::new());
        let leases = Arc::new(LeaseManager::new(
            lease_store.clone(),
            clock.clone(),
            ids.clone(),
        ));
        Arc::new(TaskManager::new(
            Arc::new(InMemoryEntityStore::<Task>::new()),
            lease_store,
            leases,
            clock,
            ids,
        ))
    }

    #[tokio::test]
    async fn run_once_applies_the_retention_window() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let tasks = managers(clock.clone());
        let old = tasks
            .create_task("old", "", Vec::new(), HashMap::new())
            .await
            .unwrap();
        clock.advance(chrono::Duration::hours(20));
        let fresh = tasks
            .create_task("fresh", "", Vec::new(), HashMap::new())
            .await
            .unwrap();
        clock.advance(chrono::Duration::hours(5));

        let reaper = ReaperLoop::new(
            tasks.clone(),
            clock.clone(),
            Duration::from_secs(24 * 3600),
            Duration::from_secs(3600),
        );
        let report = reaper.run_once().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert!(tasks.get_task(old.id).await.is_err());
        assert!(tasks.get_task(fresh.id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_reaper_runs_on_its_interval() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let tasks = managers(clock.clone());
        let old = tasks
            .create_task("old", "", Vec::new(), HashMap::new())
            .await
            .unwrap();
        clock.advance(chrono::Duration::days(2));

        let mut group = BackgroundGroup::new();
        group.push(
            ReaperLoop::new(
                tasks.clone(),
                clock.clone(),
                Duration::from_secs(24 * 3600),
                Duration::from_secs(3600),
            )
            .spawn(group.shutdown_signal()),
        );

        assert!(tasks.is_cached(old.id).await);
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(!tasks.is_cached(old.id).await);

        group.shutdown_and_join().await;
    }
}
