// src/jobs/mod.rs
//! Remote video generation jobs.
//!
//! `VideoJobApi` is the raw boundary to the generation service (start, poll,
//! fetch). `VideoJobClient` turns one prompt into one local video and folds
//! every failure into a `JobError` value.

use crate::types::{AspectRatio, MediaRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod video_job;

pub use video_job::VideoJobClient;

/// Resolution requested for every generated clip
pub const OUTPUT_RESOLUTION: &str = "720p";

/// Number of videos requested per job
pub const OUTPUTS_PER_JOB: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("API Key not found in environment")]
    MissingCredential,
    #[error("API request failed: {0}")]
    Api(String),
    #[error("Generation failed: {0}")]
    Remote(String),
    #[error("API returned no video URI")]
    NoOutput,
    #[error("Failed to download video bytes: {0}")]
    Download(String),
    #[error("Failed to store video: {0}")]
    Media(String),
    #[error("Generation was cancelled")]
    Cancelled,
    #[error("Unknown error occurred during generation: {0}")]
    Internal(String),
}

/// Handle of a started remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub name: String,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobPoll {
    pub done: bool,
    pub output_uri: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait VideoJobApi: Send + Sync {
    /// Start a job producing one clip for `prompt`
    async fn start(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<JobHandle, JobError>;

    async fn poll(&self, handle: &JobHandle) -> Result<JobPoll, JobError>;

    /// Download the produced media
    async fn fetch_bytes(&self, output_uri: &str) -> Result<Vec<u8>, JobError>;
}

/// What the orchestrator needs: one prompt in, one playable reference out
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<MediaRef, JobError>;
}
