//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml              # Crawler Configuration
//! ├── groups/
//! │   └── group-assoc.json     # Category -> group name -> id
//! └── timetables/
//!     └── {group}-{period}.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{GroupAssociations, Timetable, TimetableKey};
use crate::storage::{ASSOCIATIONS_KEY, TimetableStorage};

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// Every write gets its own temp file, so two writers racing on the same
    /// key never interleave; the last rename wins.
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TimetableStorage for LocalStorage {
    async fn load_timetable(&self, key: TimetableKey) -> Result<Option<Timetable>> {
        self.read_json(&key.storage_key()).await
    }

    async fn save_timetable(&self, key: TimetableKey, timetable: &Timetable) -> Result<()> {
        self.write_json(&key.storage_key(), timetable).await?;
        log::debug!(
            "Timetable {} ({} classes) written to {}",
            key,
            timetable.len(),
            self.path(&key.storage_key()).display()
        );
        Ok(())
    }

    async fn load_associations(&self) -> Result<Option<GroupAssociations>> {
        self.read_json(ASSOCIATIONS_KEY).await
    }

    async fn save_associations(&self, associations: &GroupAssociations) -> Result<()> {
        self.write_json(ASSOCIATIONS_KEY, associations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::timetable::tests::make_class;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("timetables/1-3.json", b"{}").await.unwrap();
        storage.write_bytes("timetables/1-3.json", b"[]").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(tmp.path().join("timetables"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["1-3.json"]);
        assert_eq!(
            storage.read_bytes("timetables/1-3.json").await.unwrap(),
            Some(b"[]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_timetable_roundtrip_by_key() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let key = TimetableKey::new(1234, 3);

        let mut timetable = Timetable::new(1234, "KrDZIs3011");
        timetable.classes.push(make_class("08:00", "Algebra", "101"));
        storage.save_timetable(key, &timetable).await.unwrap();

        assert!(tmp.path().join("timetables/1234-3.json").exists());
        let loaded = storage.load_timetable(key).await.unwrap().unwrap();
        assert_eq!(loaded, timetable);
        assert!(
            storage
                .load_timetable(TimetableKey::new(1234, 1))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_corrupt_timetable_is_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .write_bytes("timetables/5-3.json", b"{not json")
            .await
            .unwrap();

        let result = storage.load_timetable(TimetableKey::new(5, 3)).await;
        assert!(matches!(result, Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_associations_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(storage.load_associations().await.unwrap().is_none());

        let mut assoc = GroupAssociations::new();
        assoc.category_mut("Stacjonarne").insert("KrDZIs3011".into(), 1234);
        storage.save_associations(&assoc).await.unwrap();

        assert!(tmp.path().join("groups/group-assoc.json").exists());
        assert_eq!(storage.load_associations().await.unwrap(), Some(assoc));
    }
}
