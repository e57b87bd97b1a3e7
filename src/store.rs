//! Persistent local store
//!
//! A string key-value store that survives restarts. Engines persist their whole
//! state as one JSON blob under a fixed key, wrapped in a versioned envelope.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

pub const CART_KEY: &str = "vibe-bites-cart";
pub const WISHLIST_KEY: &str = "vibe-bites-wishlist";

/// Version of the persisted envelope shape. Bump when `CartState` or
/// `WishlistState` change in a way older blobs cannot deserialize into.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore { entries: Mutex<HashMap<String, String>> }

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().map_err(|_| StoreError::Poisoned)?.get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)?.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory. Last writer wins.
#[derive(Debug, Clone)]
pub struct FileStore { dir: PathBuf }

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
    fn path(&self, key: &str) -> PathBuf { self.dir.join(format!("{key}.json")) }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(tmp, self.path(key))?;
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> { version: u32, state: T }

pub fn save<T: Serialize>(store: &dyn LocalStore, key: &str, state: &T) -> Result<(), StoreError> {
    let blob = serde_json::to_string(&Envelope { version: SCHEMA_VERSION, state })?;
    store.set(key, &blob)
}

/// Reads a persisted blob. Missing, unreadable or foreign-version blobs yield `None`.
pub fn load<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Option<T> {
    let blob = match store.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(e) => { warn!(key, error = %e, "failed to read persisted state"); return None; }
    };
    match serde_json::from_str::<Envelope<T>>(&blob) {
        Ok(env) if env.version == SCHEMA_VERSION => Some(env.state),
        Ok(env) => { warn!(key, version = env.version, "discarding persisted state with unknown schema version"); None }
        Err(e) => { warn!(key, error = %e, "discarding unreadable persisted state"); None }
    }
}
