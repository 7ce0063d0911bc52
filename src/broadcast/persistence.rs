//! Moves finished local recordings into a persistent media store.
//!
//! Only used when no cloud recording was active for the session. Each file is
//! handled on its own: a missing or unreadable file is reported and skipped,
//! and whatever could not be moved stays in private storage.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::errors::MigrationError;
use super::types::RecordingType;
use crate::shared::errors::StorageError;
use crate::shared::paths::{ensure_dir, get_media_dir};

/// One file held by the media store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub id: String,
    pub album: String,
    pub path: String,
    pub kind: RecordingType,
    pub saved_at: i64,
}

/// Device media library capability.
pub trait MediaStore: Send + Sync {
    fn list(&self, album: Option<&str>) -> Result<Vec<MediaEntry>, StorageError>;
    fn exists(&self, path: &Path) -> bool;
    fn delete(&self, id: &str) -> Result<(), StorageError>;
    fn save_to_album(&self, source: &Path, album: &str, kind: RecordingType) -> Result<MediaEntry, StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaIndex {
    #[serde(default)]
    entries: Vec<MediaEntry>,
}

/// Media store backed by a directory tree: `<root>/<album>/<file>` plus `index.json`.
pub struct FsMediaStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl FsMediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            index_lock: Mutex::new(()),
        }
    }

    /// Store rooted at the default media dir.
    pub fn open_default() -> Self {
        Self::new(get_media_dir())
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn load_index(&self) -> Result<MediaIndex, StorageError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(MediaIndex::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_index(&self, index: &MediaIndex) -> Result<(), StorageError> {
        ensure_dir(&self.root).map_err(|e| StorageError::directory(e.to_string()))?;
        let content = serde_json::to_string_pretty(index)?;
        fs::write(self.index_path(), content)?;
        Ok(())
    }

    fn with_index<T>(
        &self,
        f: impl FnOnce(&mut MediaIndex) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let _guard = self
            .index_lock
            .lock()
            .map_err(|_| StorageError::directory("media index lock poisoned"))?;
        let mut index = self.load_index()?;
        let result = f(&mut index)?;
        self.save_index(&index)?;
        Ok(result)
    }
}

/// Rename when possible, copy then remove when the rename crosses devices.
fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    fs::copy(source, dest)?;
    fs::remove_file(source)
}

impl MediaStore for FsMediaStore {
    fn list(&self, album: Option<&str>) -> Result<Vec<MediaEntry>, StorageError> {
        let index = self.load_index()?;
        Ok(index
            .entries
            .into_iter()
            .filter(|e| album.map_or(true, |a| e.album == a))
            .filter(|e| Path::new(&e.path).exists())
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.with_index(|index| {
            let pos = index
                .entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| StorageError::not_found(format!("media entry {}", id)))?;
            let entry = index.entries.remove(pos);
            if Path::new(&entry.path).exists() {
                fs::remove_file(&entry.path)?;
            }
            Ok(())
        })
    }

    fn save_to_album(&self, source: &Path, album: &str, kind: RecordingType) -> Result<MediaEntry, StorageError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| StorageError::not_found(format!("{:?} has no file name", source)))?;

        let album_dir = self.root.join(album);
        ensure_dir(&album_dir).map_err(|e| StorageError::directory(e.to_string()))?;
        let dest = album_dir.join(file_name);

        self.with_index(|index| {
            move_file(source, &dest)?;
            let entry = MediaEntry {
                id: uuid::Uuid::new_v4().to_string(),
                album: album.to_string(),
                path: dest.to_string_lossy().to_string(),
                kind,
                saved_at: Utc::now().timestamp_millis(),
            };
            index.entries.push(entry.clone());
            Ok(entry)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub migrated: Vec<MediaEntry>,
    pub failures: Vec<MigrationError>,
}

impl MigrationReport {
    pub fn migrated_count(&self) -> usize {
        self.migrated.len()
    }
}

pub struct LocalPersistenceFallback {
    store: Arc<dyn MediaStore>,
    album: String,
}

impl LocalPersistenceFallback {
    pub fn new(store: Arc<dyn MediaStore>, album: impl Into<String>) -> Self {
        Self {
            store,
            album: album.into(),
        }
    }

    pub fn migrate(&self, paths: &[PathBuf], kind: RecordingType) -> MigrationReport {
        let mut report = MigrationReport::default();

        for path in paths {
            if !self.store.exists(path) {
                tracing::warn!(target: "broadcast", "[FALLBACK] Skipping missing recording {:?}", path);
                report.failures.push(MigrationError::Missing(path.clone()));
                continue;
            }

            match self.store.save_to_album(path, &self.album, kind) {
                Ok(entry) => {
                    tracing::info!(target: "broadcast", "[FALLBACK] Saved {:?} to album {}", path, self.album);
                    report.migrated.push(entry);
                }
                Err(e) => {
                    let error = match &e {
                        StorageError::Io(io) => MigrationError::from_io(path.clone(), io),
                        other => MigrationError::Io {
                            path: path.clone(),
                            message: other.to_string(),
                        },
                    };
                    tracing::warn!(target: "broadcast", "[FALLBACK] {}", error);
                    report.failures.push(error);
                }
            }
        }

        tracing::info!(
            target: "broadcast",
            "[FALLBACK] Migrated {}/{} recordings",
            report.migrated_count(),
            paths.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_recording(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"mp4").unwrap();
        path
    }

    #[test]
    fn test_migrate_moves_files_into_album() {
        let private = TempDir::new().unwrap();
        let media = TempDir::new().unwrap();
        let store = Arc::new(FsMediaStore::new(media.path().to_path_buf()));
        let fallback = LocalPersistenceFallback::new(store.clone(), "SafeCast");

        let a = write_recording(private.path(), "1-local_1-VIDEO.mp4");
        let b = write_recording(private.path(), "1-local_1-VIDEO-front.mp4");

        let report = fallback.migrate(&[a.clone(), b], RecordingType::Video);

        assert_eq!(report.migrated_count(), 2);
        assert!(report.failures.is_empty());
        assert!(!a.exists());
        assert!(media.path().join("SafeCast").join("1-local_1-VIDEO.mp4").exists());
        assert_eq!(store.list(Some("SafeCast")).unwrap().len(), 2);
    }

    #[test]
    fn test_migrate_reports_missing_files_individually() {
        let private = TempDir::new().unwrap();
        let media = TempDir::new().unwrap();
        let store = Arc::new(FsMediaStore::new(media.path().to_path_buf()));
        let fallback = LocalPersistenceFallback::new(store, "SafeCast");

        let present = write_recording(private.path(), "2-local_2-AUDIO.mp4");
        let missing = private.path().join("gone.mp4");

        let report = fallback.migrate(&[missing.clone(), present], RecordingType::Audio);

        assert_eq!(report.migrated_count(), 1);
        assert_eq!(report.failures, vec![MigrationError::Missing(missing)]);
    }

    #[test]
    fn test_delete_removes_entry_and_file() {
        let private = TempDir::new().unwrap();
        let media = TempDir::new().unwrap();
        let store = FsMediaStore::new(media.path().to_path_buf());

        let source = write_recording(private.path(), "3-local_3-AUDIO.mp4");
        let entry = store.save_to_album(&source, "SafeCast", RecordingType::Audio).unwrap();

        store.delete(&entry.id).unwrap();

        assert!(!Path::new(&entry.path).exists());
        assert!(store.list(None).unwrap().is_empty());
        assert!(matches!(store.delete(&entry.id), Err(StorageError::NotFound(_))));
    }
}
