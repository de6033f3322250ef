use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::errors::{AppError, AppResult};

/// Local string key-value storage, shaped like the browser's local storage.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
    fn keys(&self) -> AppResult<Vec<String>>;
}

fn read_lock(
    entries: &RwLock<BTreeMap<String, String>>,
) -> AppResult<RwLockReadGuard<'_, BTreeMap<String, String>>> {
    entries
        .read()
        .map_err(|_| AppError::StorageUnavailable("store lock poisoned".to_string()))
}

fn write_lock(
    entries: &RwLock<BTreeMap<String, String>>,
) -> AppResult<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
    entries
        .write()
        .map_err(|_| AppError::StorageUnavailable("store lock poisoned".to_string()))
}

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        write_lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        write_lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        Ok(read_lock(&self.entries)?.keys().cloned().collect())
    }
}

/// Keeps every entry in memory and rewrites a single JSON file on each change.
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl JsonFileKeyValueStore {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        log::debug!("Opened local store at {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Applies `change`, then restores the previous value for `key` if the file write fails.
    fn apply(
        &self,
        key: &str,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> AppResult<()> {
        let mut entries = write_lock(&self.entries)?;
        let previous = entries.get(key).cloned();
        change(&mut entries);

        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(value) => entries.insert(key.to_string(), value),
                None => entries.remove(key),
            };
            return Err(err);
        }

        Ok(())
    }
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.apply(key, |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        if !read_lock(&self.entries)?.contains_key(key) {
            return Ok(());
        }
        self.apply(key, |entries| {
            entries.remove(key);
        })
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        Ok(read_lock(&self.entries)?.keys().cloned().collect())
    }
}
