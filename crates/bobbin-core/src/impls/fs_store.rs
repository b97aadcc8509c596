//! JsonFileStore - 1 エンティティ 1 ファイルの永続化
//!
//! Layout: `<dir>/<key>.json`, one JSON document per file.
//!
//! Writes go to `<key>.json.tmp` first, are fsynced, then renamed over the
//! target, so a crash mid-write leaves either the old record or the new one.
//! Leftover `.tmp` files are ignored when listing.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::ports::{Entity, EntityStore, StoreError};

const EXTENSION: &str = "json";

pub struct JsonFileStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> JsonFileStore<T> {
    /// The directory must already exist; creating it is a bootstrap concern.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _marker: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for JsonFileStore<T> {
    async fn save(&self, entity: &T) -> Result<(), StoreError> {
        let key = entity.key();
        let mut bytes = serde_json::to_vec(entity).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        bytes.push(b'\n');

        let target = self.path_for(&key);
        let tmp = self.dir.join(format!("{key}.{EXTENSION}.tmp"));

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(Self::io_error(&tmp))?;
        file.write_all(&bytes).await.map_err(Self::io_error(&tmp))?;
        file.sync_all().await.map_err(Self::io_error(&tmp))?;
        drop(file);

        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(Self::io_error(&target))?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        tokio::fs::remove_file(&path)
            .await
            .map_err(Self::io_error(&path))
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(Self::io_error(&self.dir))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(Self::io_error(&self.dir))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(Self::io_error(&entry.path()))?;
            if file_type.is_dir() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lease, LeaseId, Task, TaskId, TaskState};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use ulid::Ulid;

    fn task_with(payload: Vec<u8>, metadata: HashMap<String, String>) -> Task {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 15).unwrap()
            + Duration::nanoseconds(123_456_789);
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            "resize",
            "resize the thumbnails",
            payload,
            metadata,
            now,
        )
    }

    #[tokio::test]
    async fn save_then_load_reproduces_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());

        let mut metadata = HashMap::new();
        metadata.insert("priority".to_string(), "high".to_string());
        let task = task_with(vec![0, 1, 2, 255], metadata);

        store.save(&task).await.unwrap();
        let loaded = store.load(&task.key()).await.unwrap().unwrap();
        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn empty_payload_and_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());
        let task = task_with(Vec::new(), HashMap::new());

        store.save(&task).await.unwrap();
        let loaded = store.load(&task.key()).await.unwrap().unwrap();
        assert!(loaded.payload.is_empty());
        assert!(loaded.metadata.is_empty());
        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn overwrite_replaces_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());
        let mut task = task_with(b"v1".to_vec(), HashMap::new());
        store.save(&task).await.unwrap();

        task.state = TaskState::Running;
        task.payload = b"v2".to_vec();
        store.save(&task).await.unwrap();

        let loaded = store.load(&task.key()).await.unwrap().unwrap();
        assert_eq!(loaded.state, TaskState::Running);
        assert_eq!(loaded.payload, b"v2");
        assert_eq!(store.list_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_is_named_after_the_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());
        let task = task_with(Vec::new(), HashMap::new());
        store.save(&task).await.unwrap();

        let expected = dir.path().join(format!("{}.json", task.id));
        assert!(expected.is_file());
        assert!(!dir.path().join(format!("{}.json.tmp", task.id)).exists());
    }

    #[tokio::test]
    async fn missing_record_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Lease>::new(dir.path());
        let key = LeaseId::from_ulid(Ulid::new()).to_string();

        assert!(store.load(&key).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&key).await,
            Err(StoreError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn listing_skips_directories_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());
        let task = task_with(Vec::new(), HashMap::new());
        store.save(&task).await.unwrap();

        std::fs::create_dir(dir.path().join("nested.json")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("half-written.json.tmp"), b"{").unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec![task.key()]);
    }

    #[tokio::test]
    async fn malformed_record_fails_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path());
        store
            .save(&task_with(Vec::new(), HashMap::new()))
            .await
            .unwrap();
        std::fs::write(dir.path().join("task-broken.json"), b"{not json").unwrap();

        let err = store.load_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref key, .. } if key == "task-broken"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Task>::new(dir.path().join("absent"));

        assert!(matches!(
            store.list_keys().await,
            Err(StoreError::Io { .. })
        ));
        assert!(matches!(
            store.save(&task_with(Vec::new(), HashMap::new())).await,
            Err(StoreError::Io { .. })
        ));
    }
}
