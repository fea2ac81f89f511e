// lib.rs - Main library file that exports all modules
pub mod config;
pub mod credentials;
pub mod export;
pub mod jobs; // 🎬 Single-scene video jobs
pub mod logging;
pub mod media;
pub mod scene_store;
pub mod script;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;
pub mod veo_client;
pub mod workflow; // 🚀 Sequential generation runs

// Re-export commonly used types for convenience
pub use config::Settings;
pub use credentials::{CredentialProvider, Keyring};
pub use export::{export_archive, ExportSummary};
pub use jobs::{JobError, SceneGenerator, VideoJobApi, VideoJobClient};
pub use scene_store::{SceneObserver, SceneStore};
pub use session::{ProjectSession, SessionError};
pub use storage::{FileStore, MemoryStore, ProjectStorage};
pub use types::*;
pub use veo_client::VeoClient;
pub use workflow::{GenerationOrchestrator, RunOutcome};
