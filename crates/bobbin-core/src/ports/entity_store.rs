//! EntityStore port - エンティティ単位の永続化
//!
//! Tasks and leases are persisted the same way: one record per id,
//! overwrite-by-id, load-everything at start-up. The managers only see this
//! trait, so the on-disk JSON backend can be swapped for another store
//! without touching their public contract.
//!
//! # 設計原則
//! - 呼び出し側（manager）がロックを持つ。store 自体は直列化を保証しない
//! - リトライはしない。失敗はそのまま返す

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Lease, Task};

/// A record that can be stored by id.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Storage key (also the file stem for file-backed stores).
    fn key(&self) -> String;
}

impl Entity for Task {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Lease {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode record {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    #[error("malformed record {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// EntityStore は id 単位の永続化
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Create or overwrite the record for `entity.key()`.
    async fn save(&self, entity: &T) -> Result<(), StoreError>;

    /// `Ok(None)` when no record exists for `key`.
    async fn load(&self, key: &str) -> Result<Option<T>, StoreError>;

    /// Remove the record. Removing a missing record is an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys of every stored record, in no particular order.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Load every record. Any unreadable record fails the whole call.
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        let keys = self.list_keys().await?;
        let mut entities = Vec::with_capacity(keys.len());
        for key in keys {
            // A record listed a moment ago but gone now is skipped.
            if let Some(entity) = self.load(&key).await? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }
}
