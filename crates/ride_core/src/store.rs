//! Persistent key-value storage for recents and favorites.
//!
//! [`JsonFileStore`] keeps every key in one versioned JSON document and
//! rewrites it atomically (temp file + rename) on each change. A missing file
//! reads as an empty store.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const STORE_FILE_VERSION: u32 = 1;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Serialize `records` as a JSON array under `key`.
pub fn save_records<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    records: &[T],
) -> Result<(), StoreError> {
    let data = serde_json::to_vec(records).map_err(|error| {
        StoreError::InvalidFormat(format!("failed to serialize '{key}': {error}"))
    })?;
    store.set(key, &data)
}

/// Load the JSON array stored under `key`; a missing key is an empty list.
pub fn load_records<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    let Some(data) = store.get(key)? else {
        return Ok(Vec::new());
    };
    serde_json::from_slice(&data).map_err(|error| {
        StoreError::InvalidFormat(format!("invalid records under '{key}': {error}"))
    })
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Io("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileV1 {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl StoreFileV1 {
    fn empty() -> Self {
        Self {
            version: STORE_FILE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Key-value store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreFileV1),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Io("store write lock poisoned".to_string()))?;
        let mut file = match load_store_file(&self.path) {
            Ok(file) => file,
            Err(StoreError::InvalidFormat(reason)) => {
                log::warn!("discarding unreadable store file: {reason}");
                StoreFileV1::empty()
            }
            Err(error) => return Err(error),
        };
        apply(&mut file);
        save_store_file_atomic(&self.path, &file)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let file = load_store_file(&self.path)?;
        Ok(file.entries.get(key).map(|value| value.clone().into_bytes()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let value = String::from_utf8(value.to_vec()).map_err(|_| {
            StoreError::InvalidFormat(format!("value for '{key}' is not valid UTF-8"))
        })?;
        self.update(|file| {
            file.entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|file| {
            file.entries.remove(key);
        })
    }
}

fn load_store_file(path: &Path) -> Result<StoreFileV1, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StoreFileV1::empty())
        }
        Err(error) => {
            return Err(StoreError::Io(format!(
                "failed to read store file '{}': {error}",
                path.display()
            )))
        }
    };

    let file: StoreFileV1 = serde_json::from_str(&contents).map_err(|error| {
        StoreError::InvalidFormat(format!("invalid store file '{}': {error}", path.display()))
    })?;

    if file.version != STORE_FILE_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "unsupported store file version {} in '{}'",
            file.version,
            path.display()
        )));
    }

    Ok(file)
}

fn save_store_file_atomic(path: &Path, file: &StoreFileV1) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| {
            StoreError::Io(format!(
                "failed to create store directory '{}': {error}",
                parent.display()
            ))
        })?;
    }

    let serialized = serde_json::to_string_pretty(file)
        .map_err(|error| StoreError::Io(format!("failed to serialize store to json: {error}")))?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
    let mut temp_file = File::create(&temp_path).map_err(|error| {
        StoreError::Io(format!(
            "failed to create temp store file '{}': {error}",
            temp_path.display()
        ))
    })?;
    temp_file.write_all(serialized.as_bytes()).map_err(|error| {
        StoreError::Io(format!(
            "failed to write temp store file '{}': {error}",
            temp_path.display()
        ))
    })?;
    temp_file.sync_all().map_err(|error| {
        StoreError::Io(format!(
            "failed to flush temp store file '{}': {error}",
            temp_path.display()
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|error| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Io(format!(
            "failed to move temp store file '{}' to '{}': {error}",
            temp_path.display(),
            path.display()
        ))
    })
}
