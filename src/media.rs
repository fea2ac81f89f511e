// media.rs - Local storage for downloaded clips
use crate::types::MediaRef;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write clip bytes to a new file and return its path as the media reference
    pub async fn store(&self, bytes: &[u8]) -> std::io::Result<MediaRef> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!(
            "{}_{}.mp4",
            Utc::now().format("%Y%m%d%H%M%S"),
            Uuid::new_v4().simple()
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!("🎞️ Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    /// Delete every stored clip
    pub async fn purge(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
