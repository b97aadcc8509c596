//! Data directory bootstrap.
//!
//! Creates `<data_dir>`, `metadata/`, `leases/` and `tasks/` when missing.
//! Safe to run on every start; any failure aborts start-up.

use std::path::PathBuf;

use bobbin_core::config::BobbinConfig;

#[derive(Debug, thiserror::Error)]
#[error("failed to create directory {}: {source}", path.display())]
pub struct BootstrapError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Returns the directories that had to be created.
pub fn ensure_data_dirs(config: &BobbinConfig) -> Result<Vec<PathBuf>, BootstrapError> {
    let mut created = Vec::new();
    for path in config.required_dirs() {
        if path.is_dir() {
            tracing::info!(path = %path.display(), "directory already exists");
            continue;
        }
        std::fs::create_dir_all(&path).map_err(|source| BootstrapError {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "directory created");
        created.push(path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_every_directory_once() {
        let root = tempfile::tempdir().unwrap();
        let config = BobbinConfig::new(root.path().join("database"));

        let created = ensure_data_dirs(&config).unwrap();
        assert_eq!(created.len(), 4);
        assert!(config.tasks_dir().is_dir());
        assert!(config.leases_dir().is_dir());
        assert!(config.metadata_dir().is_dir());

        assert!(ensure_data_dirs(&config).unwrap().is_empty());
    }

    #[test]
    fn keeps_existing_contents() {
        let root = tempfile::tempdir().unwrap();
        let config = BobbinConfig::new(root.path());
        std::fs::create_dir_all(config.tasks_dir()).unwrap();
        let record = config.tasks_dir().join("task-x.json");
        std::fs::write(&record, b"{}").unwrap();

        let created = ensure_data_dirs(&config).unwrap();
        assert_eq!(created, vec![config.metadata_dir(), config.leases_dir()]);
        assert!(record.exists());
    }

    #[test]
    fn file_in_the_way_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("database");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = ensure_data_dirs(&BobbinConfig::new(&blocker)).unwrap_err();
        assert_eq!(err.path, blocker);
    }
}
