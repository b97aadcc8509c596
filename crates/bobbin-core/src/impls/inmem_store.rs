//! InMemoryEntityStore - 開発・テスト用の store
//!
//! Records are kept as encoded JSON so the serde path is exercised exactly as
//! with the file store. Writes can be switched off to simulate a failing disk.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{Entity, EntityStore, StoreError};

pub struct InMemoryEntityStore<T> {
    records: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> InMemoryEntityStore<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// When set, `save` and `delete` fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store raw bytes under `key`, bypassing encoding.
    pub async fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.records.lock().await.insert(key.into(), bytes);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl<T: Entity> Default for InMemoryEntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for InMemoryEntityStore<T> {
    async fn save(&self, entity: &T) -> Result<(), StoreError> {
        self.check_writable()?;
        let key = entity.key();
        let bytes = serde_json::to_vec(entity).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.records.lock().await.insert(key, bytes);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<T>, StoreError> {
        let records = self.records.lock().await;
        let Some(bytes) = records.get(key) else {
            return Ok(None);
        };
        serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        match self.records.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::Unavailable(format!("no record for {key}"))),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.records.lock().await.keys().cloned().collect())
    }
}
