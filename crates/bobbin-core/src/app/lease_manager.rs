//! Lease manager: owns the lease catalog.
//!
//! Every public operation runs start-to-finish under one `tokio::sync::Mutex`
//! that guards both the in-memory catalog and all store access for it, so no
//! two lease operations interleave (including the bulk disk scans).
//!
//! The catalog is keyed two ways:
//! - primary: lease id -> lease (what the store and `GetLease` use)
//! - secondary: task id -> newest lease id (what the conflict check uses)
//!
//! Expiry is computed on read. Expired leases stay in the catalog until
//! `cleanup_expired_leases` or `release_lease` removes them, and they never
//! block a new acquisition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::{BobbinError, Lease, LeaseId, TaskId};
use crate::ports::{Clock, Entity, EntityStore, IdGenerator};

/// In-memory lease catalog.
#[derive(Default)]
struct LeaseCatalog {
    /// All known leases (single source of truth in memory).
    leases: HashMap<LeaseId, Lease>,

    /// Task id -> lease with the latest deadline for that task.
    by_task: HashMap<TaskId, LeaseId>,
}

impl LeaseCatalog {
    fn insert(&mut self, lease: Lease) {
        let replaces_index = match self.by_task.get(&lease.task_id) {
            Some(current) => self
                .leases
                .get(current)
                .is_none_or(|indexed| indexed.expires_at <= lease.expires_at),
            None => true,
        };
        if replaces_index {
            self.by_task.insert(lease.task_id, lease.id);
        }
        self.leases.insert(lease.id, lease);
    }

    fn remove(&mut self, lease_id: LeaseId) -> Option<Lease> {
        let removed = self.leases.remove(&lease_id)?;
        if self.by_task.get(&removed.task_id) == Some(&lease_id) {
            self.by_task.remove(&removed.task_id);
            // Re-point the index at whatever lease remains for the task.
            let successor = self
                .leases
                .values()
                .filter(|lease| lease.task_id == removed.task_id)
                .max_by_key(|lease| lease.expires_at)
                .map(|lease| lease.id);
            if let Some(successor) = successor {
                self.by_task.insert(removed.task_id, successor);
            }
        }
        Some(removed)
    }

    fn active_for(&self, task_id: TaskId, now: DateTime<Utc>) -> Option<&Lease> {
        self.by_task
            .get(&task_id)
            .and_then(|lease_id| self.leases.get(lease_id))
            .filter(|lease| !lease.is_expired(now))
    }

    fn counts(&self, now: DateTime<Utc>) -> LeaseCounts {
        let active = self
            .leases
            .values()
            .filter(|lease| !lease.is_expired(now))
            .count();
        LeaseCounts {
            total: self.leases.len(),
            active,
            expired: self.leases.len() - active,
        }
    }
}

/// Snapshot of the lease catalog for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LeaseCounts {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

pub struct LeaseManager {
    catalog: Mutex<LeaseCatalog>,
    store: Arc<dyn EntityStore<Lease>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn EntityStore<Lease>>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            catalog: Mutex::new(LeaseCatalog::default()),
            store,
            clock,
            ids,
        }
    }

    /// Grant `owner` a lease on `task_id` for `duration`.
    ///
    /// Fails with `LeaseConflict` while another unexpired lease exists for the
    /// same task.
    pub async fn acquire_lease(
        &self,
        task_id: TaskId,
        duration: Duration,
        owner: &str,
    ) -> Result<Lease, BobbinError> {
        validate_duration(duration)?;
        if owner.trim().is_empty() {
            return Err(BobbinError::InvalidArgument(
                "lease owner must not be empty".to_string(),
            ));
        }

        let mut catalog = self.catalog.lock().await;
        let now = self.clock.now();

        if let Some(active) = catalog.active_for(task_id, now) {
            return Err(BobbinError::LeaseConflict {
                task_id,
                lease_id: active.id,
            });
        }

        let lease = Lease::new(self.ids.generate_lease_id(), task_id, duration, owner, now);
        self.store.save(&lease).await?;
        catalog.insert(lease.clone());

        tracing::info!(
            lease_id = %lease.id,
            task_id = %task_id,
            owner = %owner,
            expires_at = %lease.expires_at,
            "lease acquired"
        );
        Ok(lease)
    }

    pub async fn release_lease(&self, lease_id: LeaseId) -> Result<(), BobbinError> {
        let mut catalog = self.catalog.lock().await;
        let Some(lease) = catalog.leases.get(&lease_id) else {
            return Err(BobbinError::LeaseNotFound(lease_id));
        };

        self.store.delete(&lease.key()).await?;
        catalog.remove(lease_id);

        tracing::info!(lease_id = %lease_id, "lease released");
        Ok(())
    }

    /// Push the deadline of a live lease to `now + duration`.
    ///
    /// Only the original acquirer may extend. Checks run in this order:
    /// duration, existence, owner, expiry, forward movement.
    pub async fn extend_lease(
        &self,
        lease_id: LeaseId,
        duration: Duration,
        owner: &str,
    ) -> Result<Lease, BobbinError> {
        validate_duration(duration)?;

        let mut catalog = self.catalog.lock().await;
        let now = self.clock.now();

        let Some(current) = catalog.leases.get(&lease_id) else {
            return Err(BobbinError::LeaseNotFound(lease_id));
        };
        if !current.is_owned_by(owner) {
            return Err(BobbinError::PermissionDenied {
                lease_id,
                owner: current.created_by.clone(),
                requested_by: owner.to_string(),
            });
        }
        if current.is_expired(now) {
            return Err(BobbinError::LeaseExpired(lease_id));
        }

        let new_expiry = now + duration;
        if new_expiry <= current.expires_at {
            return Err(BobbinError::InvalidArgument(format!(
                "extension to {new_expiry} does not move the deadline past {}",
                current.expires_at
            )));
        }

        // Persist first; memory only changes once the record is durable.
        let mut extended = current.clone();
        extended.extend_to(new_expiry, owner, now);
        self.store.save(&extended).await?;
        catalog.insert(extended.clone());

        tracing::info!(lease_id = %lease_id, expires_at = %new_expiry, "lease extended");
        Ok(extended)
    }

    pub async fn get_lease(&self, lease_id: LeaseId) -> Result<Lease, BobbinError> {
        let catalog = self.catalog.lock().await;
        catalog
            .leases
            .get(&lease_id)
            .cloned()
            .ok_or(BobbinError::LeaseNotFound(lease_id))
    }

    /// The unexpired lease currently held on `task_id`, if any.
    pub async fn active_lease_for(&self, task_id: TaskId) -> Option<Lease> {
        let catalog = self.catalog.lock().await;
        catalog.active_for(task_id, self.clock.now()).cloned()
    }

    pub async fn has_active_lease(&self, task_id: TaskId) -> bool {
        self.active_lease_for(task_id).await.is_some()
    }

    /// Populate the catalog from the store. A malformed record aborts the load.
    pub async fn load_leases(&self) -> Result<usize, BobbinError> {
        let mut catalog = self.catalog.lock().await;
        let leases = self.store.load_all().await?;
        let loaded = leases.len();
        for lease in leases {
            catalog.insert(lease);
        }
        tracing::info!(loaded, "leases loaded");
        Ok(loaded)
    }

    /// Delete every expired lease found on disk, durable record first.
    ///
    /// Nothing schedules this internally; see `LeaseSweepLoop` for a driver.
    pub async fn cleanup_expired_leases(&self) -> Result<usize, BobbinError> {
        let mut catalog = self.catalog.lock().await;
        let now = self.clock.now();

        let mut removed = 0;
        for lease in self.store.load_all().await? {
            if !lease.is_expired(now) {
                continue;
            }
            self.store.delete(&lease.key()).await?;
            catalog.remove(lease.id);
            removed += 1;
        }

        tracing::debug!(removed, "expired leases cleaned up");
        Ok(removed)
    }

    pub async fn counts(&self) -> LeaseCounts {
        let catalog = self.catalog.lock().await;
        catalog.counts(self.clock.now())
    }
}

fn validate_duration(duration: Duration) -> Result<(), BobbinError> {
    if duration <= Duration::zero() {
        return Err(BobbinError::InvalidArgument(format!(
            "lease duration must be positive, got {duration}"
        )));
    }
    Ok(())
}
