//! Filesystem storage for resolved payloads.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use irdata_core::error::{Error, InvalidInputError, StorageError};
use irdata_core::{Result, Store};

const MANIFEST_FILE: &str = "manifest.jsonl";
const LOCK_FILE: &str = "store.lock";

fn map_io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |err| {
        Error::Storage(StorageError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }
}

/// One line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEntry {
    /// Logical name the payload was saved under.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// When the save completed.
    pub saved_at: DateTime<Utc>,
}

/// Saves payloads as `<root>/<name>.json`.
///
/// Every write goes to a temporary file that is renamed into place, so a
/// reader never sees a half-written payload. Saves are serialised across
/// processes with an exclusive lock on `store.lock`, and each one appends a
/// line to `manifest.jsonl`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Names become file names, so only a conservative character set is
    /// accepted and nothing that could escape the root or hide the file.
    fn validate_name(name: &str) -> Result<()> {
        let reason = if name.is_empty() {
            Some("cannot be empty")
        } else if name.starts_with('.') {
            Some("cannot start with '.'")
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            Some("only ASCII letters, digits, '-', '_' and '.' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidInputError::StoreName {
                value: name.to_string(),
                reason: reason.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn lock(&self) -> Result<File> {
        let lock_path = self.root.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(map_io(&lock_path))?;

        lock_file
            .lock_exclusive()
            .map_err(map_io(&lock_path))?;
        Ok(lock_file)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8], name: &str) -> Result<()> {
        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = File::create(&temp_path).map_err(map_io(&temp_path))?;
            file.write_all(bytes).map_err(map_io(&temp_path))?;
            file.sync_all().map_err(map_io(&temp_path))?;
            fs::rename(&temp_path, path).map_err(map_io(path))
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn append_manifest(&self, entry: &SavedEntry) -> Result<()> {
        let manifest_path = self.manifest_path();
        let line = serde_json::to_string(entry).map_err(|e| {
            Error::Storage(StorageError::Manifest {
                message: e.to_string(),
            })
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest_path)
            .map_err(map_io(&manifest_path))?;

        writeln!(file, "{}", line).map_err(map_io(&manifest_path))?;
        file.sync_data().map_err(map_io(&manifest_path))?;
        Ok(())
    }

    /// Save `bytes` as `name`, replacing any earlier payload with that name.
    #[instrument(skip(self, bytes), fields(root = %self.root.display(), bytes = bytes.len()))]
    pub fn save_blocking(&self, name: &str, bytes: &[u8]) -> Result<SavedEntry> {
        Self::validate_name(name)?;
        fs::create_dir_all(&self.root).map_err(map_io(&self.root))?;

        let lock_file = self.lock()?;

        let path = self.payload_path(name);
        self.write_atomic(&path, bytes, name)?;

        let entry = SavedEntry {
            name: name.to_string(),
            size: bytes.len() as u64,
            saved_at: Utc::now(),
        };
        self.append_manifest(&entry)?;

        let lock_path = self.root.join(LOCK_FILE);
        lock_file.unlock().map_err(map_io(&lock_path))?;

        debug!(path = %path.display(), "Saved payload");
        Ok(entry)
    }

    /// Read back a saved payload. Returns `None` if nothing was saved under `name`.
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Self::validate_name(name)?;
        let path = self.payload_path(name);

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(&path)(err)),
        }
    }

    /// The latest manifest entry for every saved name, ordered by name.
    pub fn list(&self) -> Result<Vec<SavedEntry>> {
        let manifest_path = self.manifest_path();

        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(map_io(&manifest_path)(err)),
        };

        let mut latest = BTreeMap::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: SavedEntry = serde_json::from_str(line).map_err(|e| {
                Error::Storage(StorageError::Manifest {
                    message: format!("line {}: {}", index + 1, e),
                })
            })?;
            latest.insert(entry.name.clone(), entry);
        }

        Ok(latest.into_values().collect())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.save_blocking(name, bytes).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data"));
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_load() {
        let (_dir, store) = store();
        let payload = br#"[{"car_id":1}]"#;

        store.save("carlist", payload).await.unwrap();

        assert_eq!(store.load("carlist").unwrap().as_deref(), Some(&payload[..]));
        assert!(store.root().join("carlist.json").exists());
    }

    #[test]
    fn load_missing_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.load("tracks").unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_previous_payload() {
        let (_dir, store) = store();

        store.save("doc", b"{\"v\":1}").await.unwrap();
        store.save("doc", b"{\"v\":22}").await.unwrap();

        assert_eq!(store.load("doc").unwrap().unwrap(), b"{\"v\":22}");

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "doc");
        assert_eq!(entries[0].size, 8);
    }

    #[tokio::test]
    async fn manifest_keeps_every_save() {
        let (_dir, store) = store();

        store.save("tracks", b"[]").await.unwrap();
        store.save("carlist", b"[1]").await.unwrap();
        store.save("tracks", b"[2]").await.unwrap();

        let manifest = fs::read_to_string(store.root().join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.lines().count(), 3);

        let names: Vec<_> = store.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["carlist", "tracks"]);
    }

    #[tokio::test]
    async fn no_temporary_files_left_behind() {
        let (_dir, store) = store();
        store.save("member.chart-2", b"{}").await.unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (_dir, store) = store();

        for name in ["", ".hidden", "../escape", "a/b", "with space", "ünïcode"] {
            let err = store.save_blocking(name, b"{}").unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(InvalidInputError::StoreName { .. })),
                "{name:?} should be rejected"
            );
        }
        assert!(!store.root().exists());
    }

    #[test]
    fn list_of_empty_store_is_empty() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_manifest_is_reported() {
        let (_dir, store) = store();
        store.save_blocking("doc", b"{}").unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.root().join(MANIFEST_FILE))
            .unwrap();
        writeln!(file, "not json").unwrap();

        let err = store.list().unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::Manifest { ref message }) if message.starts_with("line 2")
        ));
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let (_dir, store) = store();
        let dyn_store: &dyn Store = &store;

        dyn_store.save("doc", b"{\"ok\":true}").await.unwrap();
        assert!(store.load("doc").unwrap().is_some());
    }
}
