//! Durable storage port for the persisted principal.
//!
//! The session store only needs synchronous `get`/`set`/`remove` over string
//! keys. Backends that can observe writes made by other holders of the same
//! storage (another tab, another process) expose them through `subscribe`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{SessionError, SessionResult};

const EVENT_CAPACITY: usize = 64;

/// A write observed on shared storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SessionResult<()>;
    fn remove(&self, key: &str) -> SessionResult<()>;

    /// Change feed for writes made through any handle on the same storage.
    fn subscribe(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        None
    }
}

/// Thread-safe in-memory storage. Clones share the same map and change feed,
/// like tabs of one origin sharing `localStorage`.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .map(|guard| guard.contains_key(key))
            .unwrap_or(false)
    }

    fn notify(&self, key: &str, new_value: Option<String>) {
        // no receivers is fine
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> SessionError {
    SessionError::StorageUnavailable("storage lock poisoned".to_string())
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let guard = self.inner.read().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        {
            let mut guard = self.inner.write().map_err(poisoned)?;
            guard.insert(key.to_string(), value.to_string());
        }
        self.notify(key, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        let removed = {
            let mut guard = self.inner.write().map_err(poisoned)?;
            guard.remove(key).is_some()
        };
        if removed {
            self.notify(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        Some(self.events.subscribe())
    }
}

/// One JSON document per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> SessionResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(SessionError::StorageUnavailable(format!(
                "invalid storage key '{key}'"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(err: std::io::Error) -> SessionError {
    SessionError::StorageUnavailable(err.to_string())
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(io_error)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(io_error)?;
        fs::rename(&tmp, &path).map_err(io_error)?;
        debug!(path = %path.display(), "persisted session entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(err)),
        }
    }
}
