// src/export.rs
//! Package completed scenes into a single zip archive.

use crate::types::{GenerationStatus, Scene, SceneNumber};
use crate::utils::sanitize_file_name;
use std::borrow::Borrow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const FALLBACK_FOLDER: &str = "veo-scenes";
const FALLBACK_ARCHIVE: &str = "veo-project";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub archive: PathBuf,
    pub entries: Vec<String>,
    pub skipped: usize,
}

/// `scene_01.mp4` style name for a scene
pub fn archive_entry_name(scene: &SceneNumber) -> String {
    format!("scene_{:0>2}.mp4", scene.to_string())
}

/// Write `<project>.zip` into `out_dir` with one entry per completed scene.
///
/// Completed scenes without a media reference, or whose file can no longer
/// be read, are skipped and counted. Returns `Ok(None)` and writes nothing
/// when no clip can be exported.
pub fn export_archive<S: Borrow<Scene>>(
    project_name: &str,
    scenes: &[S],
    out_dir: &Path,
) -> Result<Option<ExportSummary>, ExportError> {
    let mut clips: Vec<(&Scene, Vec<u8>)> = Vec::new();
    let mut skipped = 0;
    for scene in scenes
        .iter()
        .map(<S as Borrow<Scene>>::borrow)
        .filter(|s| s.status == GenerationStatus::Completed)
    {
        let Some(media_ref) = scene.media_ref.as_deref() else {
            tracing::warn!("Skipping scene {}: no video", scene.scene);
            skipped += 1;
            continue;
        };
        match std::fs::read(media_ref) {
            Ok(bytes) => clips.push((scene, bytes)),
            Err(e) => {
                tracing::warn!("Skipping scene {}: cannot read {}: {}", scene.scene, media_ref, e);
                skipped += 1;
            }
        }
    }

    if clips.is_empty() {
        tracing::info!("No completed scenes to export");
        return Ok(None);
    }

    let name = project_name.trim();
    let folder = if name.is_empty() {
        FALLBACK_FOLDER.to_string()
    } else {
        sanitize_file_name(name)
    };
    let archive_stem = if name.is_empty() {
        FALLBACK_ARCHIVE.to_string()
    } else {
        sanitize_file_name(name)
    };

    std::fs::create_dir_all(out_dir)?;
    let archive = out_dir.join(format!("{}.zip", archive_stem));
    let mut zip = ZipWriter::new(File::create(&archive)?);
    // clips are already compressed
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.add_directory(format!("{}/", folder), options)?;

    let mut entries = Vec::with_capacity(clips.len());
    for (scene, bytes) in clips {
        let entry = format!("{}/{}", folder, archive_entry_name(&scene.scene));
        zip.start_file(entry.as_str(), options)?;
        zip.write_all(&bytes)?;
        entries.push(entry);
    }
    zip.finish()?;

    tracing::info!("📦 Exported {} scenes to {}", entries.len(), archive.display());
    Ok(Some(ExportSummary {
        archive,
        entries,
        skipped,
    }))
}
