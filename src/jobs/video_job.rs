// src/jobs/video_job.rs
//! Single-scene job runner: start, poll until done, download, store locally.

use super::{JobError, JobHandle, JobPoll, SceneGenerator, VideoJobApi};
use crate::credentials::CredentialProvider;
use crate::media::MediaStore;
use crate::types::{AspectRatio, MediaRef};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Fixed delay between two polls of a running job
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct VideoJobClient {
    api: Arc<dyn VideoJobApi>,
    credentials: Arc<dyn CredentialProvider>,
    media: MediaStore,
    poll_interval: Duration,
    shutdown: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl VideoJobClient {
    pub fn new(
        api: Arc<dyn VideoJobApi>,
        credentials: Arc<dyn CredentialProvider>,
        media: MediaStore,
    ) -> Self {
        Self {
            api,
            credentials,
            media,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: CancellationToken::new(),
            current: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Parent token for every job. Cancelling it stops this client for good.
    pub fn with_cancellation(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Abort the poll loop of the job in flight, if any. Later submits are
    /// unaffected. Returns whether a job was cancelled.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Generate one clip. Never panics and never propagates a fault: every
    /// failure, including a panic inside the job, comes back as `Err`.
    pub async fn submit(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<MediaRef, JobError> {
        let started = Instant::now();
        let job_token = self.shutdown.child_token();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(job_token.clone());
        let outcome = AssertUnwindSafe(self.run_job(prompt, aspect_ratio, &job_token))
            .catch_unwind()
            .await;
        self.current.lock().unwrap_or_else(PoisonError::into_inner).take();

        match outcome {
            Ok(Ok(media_ref)) => {
                tracing::info!(
                    "✅ Video ready after {:.1}s: {}",
                    started.elapsed().as_secs_f64(),
                    media_ref
                );
                Ok(media_ref)
            }
            Ok(Err(e)) => {
                tracing::error!("Veo generation error: {}", e);
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Veo generation panicked: {}", message);
                Err(JobError::Internal(message))
            }
        }
    }

    async fn run_job(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        cancel: &CancellationToken,
    ) -> Result<MediaRef, JobError> {
        if !self.credentials.has_key() {
            return Err(JobError::MissingCredential);
        }

        let handle = self.api.start(prompt, aspect_ratio).await?;
        tracing::info!("🎬 Video job started: {} ({})", handle.name, aspect_ratio);

        let finished = self.wait_for_job(&handle, cancel).await?;
        if let Some(message) = finished.error {
            return Err(JobError::Remote(message));
        }
        let output_uri = finished.output_uri.ok_or(JobError::NoOutput)?;

        let bytes = self.api.fetch_bytes(&output_uri).await?;
        self.media
            .store(&bytes)
            .await
            .map_err(|e| JobError::Media(e.to_string()))
    }

    /// Poll until the job reports done. There is no timeout: the remote job
    /// is trusted to terminate.
    async fn wait_for_job(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<JobPoll, JobError> {
        let mut polls: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Video job {} cancelled after {} polls", handle.name, polls);
                    return Err(JobError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            polls += 1;
            let status = self.api.poll(handle).await?;
            if status.done {
                tracing::debug!("Video job {} finished after {} polls", handle.name, polls);
                return Ok(status);
            }
            tracing::debug!("⏳ Video job {} still running (poll {})", handle.name, polls);
        }
    }
}

#[async_trait]
impl SceneGenerator for VideoJobClient {
    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<MediaRef, JobError> {
        self.submit(prompt, aspect_ratio).await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic inside video job".to_string()
    }
}
