use crate::{domain::KeyValueStore, errors::StorageError};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};
use tracing;

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as one JSON object file, rewritten on every commit.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the state file. A missing file starts empty. A file that is not
    /// a JSON object is renamed to `<file>.corrupt-<timestamp>` before
    /// starting empty, and a file that cannot be read at all is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(object) => {
                    let entries = into_entries(object);
                    let keys = entries.len();
                    tracing::info!(path = %path.display(), keys, "State file loaded");
                    entries
                }
                Err(e) => {
                    let aside = move_aside(&path)?;
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "State file is malformed, kept aside and starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "State file unreadable");
                return Err(StorageError::Io(e));
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Write to a sibling temp file then rename, so a crash never leaves a torn file.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        tracing::trace!(path = %self.path.display(), "State file flushed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_many(&[(key, value.to_string())])
    }

    fn set_many(&self, updates: &[(&str, String)]) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        let mut next = entries.clone();
        for (key, value) in updates {
            next.insert((*key).to_string(), value.clone());
        }
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

// Values are strings; anything else was written by hand and keeps its JSON text.
fn into_entries(object: Map<String, Value>) -> BTreeMap<String, String> {
    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}

fn move_aside(path: &Path) -> Result<PathBuf, StorageError> {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".corrupt-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")));
    let aside = path.with_file_name(name);
    fs::rename(path, &aside)?;
    Ok(aside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_reads_back_writes() {
        let store = MemoryStore::new();
        assert_eq!(store.get("likes_1"), None);
        store.set("likes_1", "3").unwrap();
        assert_eq!(store.get("likes_1").as_deref(), Some("3"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).expect("state file opens");
        store
            .set_many(&[("likes_1", "1".to_string()), ("isLiked_1", "true".to_string())])
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).expect("state file reopens");
        assert_eq!(reopened.get("likes_1").as_deref(), Some("1"));
        assert_eq!(reopened.get("isLiked_1").as_deref(), Some("true"));
    }

    #[test]
    fn malformed_state_file_is_kept_aside() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, "not json at all").unwrap();

        let store = FileStore::open(&path).expect("malformed file still opens");
        assert_eq!(store.get("likedMemes"), None);
        store.set("likedMemes", "[]").unwrap();

        let aside: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("state.json.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(fs::read_to_string(&aside[0]).unwrap(), "not json at all");
        assert_eq!(FileStore::open(&path).unwrap().get("likedMemes").as_deref(), Some("[]"));
    }

    #[test]
    fn non_string_values_are_kept() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"likes_m1":"3","isLiked_m1":"true","extra":5}"#).unwrap();

        let store = FileStore::open(&path).expect("state file opens");
        store.set("comments_m2", "[]").unwrap();

        let reopened = FileStore::open(&path).expect("state file reopens");
        assert_eq!(reopened.get("likes_m1").as_deref(), Some("3"));
        assert_eq!(reopened.get("isLiked_m1").as_deref(), Some("true"));
        assert_eq!(reopened.get("extra").as_deref(), Some("5"));
        assert_eq!(reopened.get("comments_m2").as_deref(), Some("[]"));
    }

    #[test]
    fn unreadable_state_file_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // A directory cannot be read as a file
        assert!(FileStore::open(dir.path()).is_err());
    }
}
