// scene_store.rs - Ordered, copy-on-write scene sequence
//! The store is the single source of truth for generation state.
//!
//! Readers get an immutable snapshot (`Arc<Vec<Arc<Scene>>>`). A status update
//! builds a new vector that shares every untouched record with the previous
//! snapshot and swaps in one freshly built record, so a reader never sees a
//! half-updated scene.

use crate::types::{GenerationStatus, MediaRef, Scene};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;

pub type SceneSnapshot = Arc<Vec<Arc<Scene>>>;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("Scene index {index} is out of range (project has {len} scenes)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Notified synchronously after every mutation, in mutation order.
///
/// Observers run while the store's write lock is held and must not call back
/// into the store.
pub trait SceneObserver: Send + Sync {
    fn scenes_changed(&self, scenes: &[Arc<Scene>]);
}

pub struct SceneStore {
    scenes: RwLock<SceneSnapshot>,
    observers: RwLock<Vec<Arc<dyn SceneObserver>>>,
    updates: watch::Sender<SceneSnapshot>,
}

impl SceneStore {
    pub fn new() -> Self {
        let empty: SceneSnapshot = Arc::new(Vec::new());
        let (updates, _) = watch::channel(empty.clone());
        Self {
            scenes: RwLock::new(empty),
            observers: RwLock::new(Vec::new()),
            updates,
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SceneObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Receive every new snapshot (display consumers)
    pub fn subscribe(&self) -> watch::Receiver<SceneSnapshot> {
        self.updates.subscribe()
    }

    /// Replace the whole sequence, e.g. after parsing a new script
    pub fn replace_all(&self, scenes: Vec<Scene>) {
        let next: SceneSnapshot = Arc::new(scenes.into_iter().map(Arc::new).collect());
        self.commit(|_| Ok::<_, StoreError>((next, ()))).ok();
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    pub fn get(&self, index: usize) -> Option<Arc<Scene>> {
        self.all().get(index).cloned()
    }

    pub fn all(&self) -> SceneSnapshot {
        self.scenes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.all().iter().filter(|s| s.status.is_completed()).count()
    }

    /// Move one scene to `status`, replacing only that record
    pub fn update_status(
        &self,
        index: usize,
        status: GenerationStatus,
        media_ref: Option<MediaRef>,
        error: Option<String>,
    ) -> Result<Arc<Scene>, StoreError> {
        let updated = self.commit(|current| {
            let scene = current.get(index).ok_or(StoreError::IndexOutOfRange {
                index,
                len: current.len(),
            })?;
            let replacement = Arc::new(scene.with_status(status, media_ref, error));
            let mut next: Vec<Arc<Scene>> = current.iter().cloned().collect();
            next[index] = replacement.clone();
            Ok((Arc::new(next), replacement))
        })?;

        tracing::debug!("📊 Scene {} -> {:?}", index, status);
        Ok(updated)
    }

    /// Force a scene back to `Idle` (explicit retry)
    pub fn reset_status(&self, index: usize) -> Result<Arc<Scene>, StoreError> {
        self.update_status(index, GenerationStatus::Idle, None, None)
    }

    fn commit<T, E>(
        &self,
        build: impl FnOnce(&SceneSnapshot) -> Result<(SceneSnapshot, T), E>,
    ) -> Result<T, E> {
        let mut guard = self.scenes.write().unwrap_or_else(PoisonError::into_inner);
        let (next, value) = build(&guard)?;
        *guard = next.clone();

        for observer in self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            observer.scenes_changed(&next);
        }
        self.updates.send_replace(next);
        Ok(value)
    }
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}
