//! Local JSON file snapshot store.

use std::path::PathBuf;

use async_trait::async_trait;
use tender_watch_tender_models::Snapshot;

use crate::{PersistenceError, SnapshotStore};

/// Snapshot store backed by a single JSON file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so readers never observe a partially written blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone as _;
    use tender_watch_tender_models::{Category, TenderRecord};

    fn snapshot(reference: &str) -> Snapshot {
        let mut data = BTreeMap::new();
        data.insert(
            Category::AwardedTenders,
            vec![TenderRecord::new(reference, "Fornecimento")],
        );
        Snapshot::new(data, chrono::Utc.with_ymd_and_hms(2024, 7, 9, 3, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("snapshot.json"));
        assert_eq!(store.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_overwrites_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("snapshot.json"));

        store.write(&snapshot("A/1")).await.unwrap();
        store.write(&snapshot("A/2")).await.unwrap();

        assert_eq!(store.read().await.unwrap(), Some(snapshot("A/2")));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = FileStore::new(path).read().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }
}
