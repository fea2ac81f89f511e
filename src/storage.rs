// storage.rs - Project snapshot persistence
//! Best-effort snapshot of `(config, scenes)` in a local key-value store.
//! Nothing here ever fails the in-memory flow: errors are logged and dropped.

use crate::scene_store::SceneObserver;
use crate::types::{ProjectConfig, Scene};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error};

pub const CONFIG_KEY: &str = "veo_director_config";
pub const SCENES_KEY: &str = "veo_director_scenes";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a truncated value behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used by tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Restored project state. Either half may be missing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub config: Option<ProjectConfig>,
    pub scenes: Option<Vec<Scene>>,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.config.is_some() && self.scenes.is_some()
    }
}

#[derive(Clone)]
pub struct ProjectStorage {
    kv: Arc<dyn KeyValueStore>,
}

impl ProjectStorage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Write both halves of the snapshot. Failures are logged, never returned.
    pub fn save(&self, config: &ProjectConfig, scenes: &[Scene]) {
        if let Err(e) = self.try_save(config, scenes) {
            error!("Failed to save project: {}", e);
        }
    }

    fn try_save(&self, config: &ProjectConfig, scenes: &[Scene]) -> Result<(), StorageError> {
        // serialize both before touching the store
        let config_json = serde_json::to_string(config)?;
        let scenes_json = serde_json::to_string(scenes)?;
        self.kv.set(CONFIG_KEY, &config_json)?;
        self.kv.set(SCENES_KEY, &scenes_json)?;
        debug!("💾 Project saved ({} scenes)", scenes.len());
        Ok(())
    }

    /// Read the snapshot. Any failure yields an empty snapshot.
    pub fn load(&self) -> Snapshot {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load project: {}", e);
                Snapshot::default()
            }
        }
    }

    fn try_load(&self) -> Result<Snapshot, StorageError> {
        let config = match self.kv.get(CONFIG_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        let scenes = match self.kv.get(SCENES_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(Snapshot { config, scenes })
    }

    pub fn clear(&self) {
        for key in [CONFIG_KEY, SCENES_KEY] {
            if let Err(e) = self.kv.remove(key) {
                error!("Failed to clear {}: {}", key, e);
            }
        }
    }
}

/// Scene store observer that rewrites the snapshot after each mutation
pub struct SnapshotWriter {
    storage: ProjectStorage,
    config: Arc<RwLock<ProjectConfig>>,
}

impl SnapshotWriter {
    pub fn new(storage: ProjectStorage, config: Arc<RwLock<ProjectConfig>>) -> Self {
        Self { storage, config }
    }
}

impl SceneObserver for SnapshotWriter {
    fn scenes_changed(&self, scenes: &[Arc<Scene>]) {
        if scenes.is_empty() {
            return;
        }
        let config = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let owned: Vec<Scene> = scenes.iter().map(|s| Scene::clone(s)).collect();
        self.storage.save(&config, &owned);
    }
}
