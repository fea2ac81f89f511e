// session.rs - One open project: config + scenes + snapshot persistence
use crate::credentials::{CredentialError, CredentialProvider};
use crate::export::{export_archive, ExportError, ExportSummary};
use crate::scene_store::SceneStore;
use crate::script::{parse_scene_script, ScriptError};
use crate::storage::{ProjectStorage, SnapshotWriter};
use crate::types::{GenerationStatus, ProjectConfig, Scene};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid scene script: {0}")]
    Script(#[from] ScriptError),
    #[error("Project is not configured: {0}")]
    NotConfigured(String),
    #[error("No API key selected")]
    MissingCredential,
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Counts shown above the scene list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressSummary {
    /// A run may start when some scene is not completed and none is active
    pub fn can_start(&self, run_active: bool) -> bool {
        !run_active && self.completed < self.total
    }
}

pub struct ProjectSession {
    config: Arc<RwLock<ProjectConfig>>,
    store: Arc<SceneStore>,
    storage: ProjectStorage,
    credentials: Arc<dyn CredentialProvider>,
}

impl ProjectSession {
    /// Open the project, restoring the persisted snapshot if there is a full one.
    ///
    /// This is the only place the snapshot is read.
    pub fn open(storage: ProjectStorage, credentials: Arc<dyn CredentialProvider>) -> Self {
        let snapshot = storage.load();
        let config = Arc::new(RwLock::new(ProjectConfig::default()));
        let store = Arc::new(SceneStore::new());
        store.add_observer(Arc::new(SnapshotWriter::new(storage.clone(), config.clone())));

        let session = Self {
            config,
            store,
            storage,
            credentials,
        };

        if let (Some(config), Some(scenes)) = (snapshot.config, snapshot.scenes) {
            info!("📂 Restored project '{}' ({} scenes)", config.project_name, scenes.len());
            *session.config.write().unwrap_or_else(PoisonError::into_inner) = config;
            session.store.replace_all(scenes.into_iter().map(settle_interrupted).collect());
        }
        session.refresh_credentials();
        session
    }

    pub fn config(&self) -> ProjectConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Config handle shared with the orchestrator (read-only there)
    pub fn shared_config(&self) -> Arc<RwLock<ProjectConfig>> {
        self.config.clone()
    }

    pub fn store(&self) -> Arc<SceneStore> {
        self.store.clone()
    }

    pub fn scenes(&self) -> Vec<Arc<Scene>> {
        self.store.all().to_vec()
    }

    /// Change project settings. Already parsed scenes keep their final prompt.
    pub fn update_config(&self, edit: impl FnOnce(&mut ProjectConfig)) {
        let updated = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            edit(&mut config);
            config.clone()
        };
        self.persist_config(&updated);
    }

    /// Re-evaluate the key-present flag against the credential provider
    pub fn refresh_credentials(&self) -> bool {
        let present = self.credentials.has_key();
        if self.config().api_key_present != present {
            self.update_config(|c| c.api_key_present = present);
        }
        present
    }

    /// Make sure a key is selected, optionally prompting the user for one
    pub fn ensure_credential(&self, prompt: bool) -> Result<(), SessionError> {
        if self.refresh_credentials() {
            return Ok(());
        }
        if prompt {
            self.credentials.select_key()?;
        }
        if self.refresh_credentials() {
            Ok(())
        } else {
            Err(SessionError::MissingCredential)
        }
    }

    /// Parse a scene script and replace the current scene list with it.
    ///
    /// On any error the existing scenes are left untouched.
    pub fn load_script(&self, json: &str) -> Result<usize, SessionError> {
        let config = self.config();
        if config.project_name.trim().is_empty() {
            return Err(SessionError::NotConfigured("project name is empty".into()));
        }

        let scenes = parse_scene_script(json, &config.style_prompt)?;
        let count = scenes.len();
        self.store.replace_all(scenes);
        info!("🎞️ Loaded {} scenes", count);
        Ok(count)
    }

    pub fn summary(&self) -> ProgressSummary {
        let scenes = self.store.all();
        ProgressSummary {
            total: scenes.len(),
            completed: scenes.iter().filter(|s| s.status.is_completed()).count(),
            failed: scenes
                .iter()
                .filter(|s| s.status == GenerationStatus::Failed)
                .count(),
        }
    }

    /// Position of the scene whose number prints as `label`
    pub fn index_of(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        self.store
            .all()
            .iter()
            .position(|s| s.scene.to_string() == label)
    }

    pub fn export(&self, out_dir: &Path) -> Result<Option<ExportSummary>, ExportError> {
        let project_name = self.config().project_name;
        export_archive(&project_name, &self.scenes(), out_dir)
    }

    /// Start a new project: drop all scenes, purge the snapshot, forget the
    /// key flag. Name, style and aspect ratio are kept in memory.
    pub fn reset(&self) {
        self.storage.clear();
        self.store.clear();
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .api_key_present = false;
        info!("🧹 Project reset");
    }

    fn persist_config(&self, config: &ProjectConfig) {
        let scenes = self.store.all();
        if scenes.is_empty() {
            return;
        }
        let owned: Vec<Scene> = scenes.iter().map(|s| Scene::clone(s)).collect();
        self.storage.save(config, &owned);
    }
}

/// A scene persisted mid-generation belongs to a run that no longer exists
fn settle_interrupted(scene: Scene) -> Scene {
    if scene.status == GenerationStatus::Generating {
        scene.with_status(GenerationStatus::Idle, None, None)
    } else {
        scene
    }
}
