//! Discovery of the rendered video in the engine's output tree.
//!
//! The engine writes one batch directory per invocation under its output
//! root. [`locate_artifact`] picks the newest batch and then the video file
//! in it that belongs to the requested scene. Both steps are deterministic:
//! ties are broken by name, never by directory traversal order.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use eduvision_core::scene::SceneName;
use walkdir::WalkDir;

/// File extensions accepted as rendered video (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "gif"];

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// The output root is missing or has no batch directory.
    #[error("no render batch found under {}", .0.display())]
    NoBatch(PathBuf),

    /// The newest batch has no video for the scene.
    #[error("no video for scene '{scene}' in {}", .batch.display())]
    NotFound { scene: String, batch: PathBuf },

    #[error("I/O error while scanning render output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk render output: {0}")]
    Walk(#[from] walkdir::Error),
}

impl LocateError {
    /// Whether the scan completed and simply found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoBatch(_) | Self::NotFound { .. })
    }
}

/// Find the video for `scene` in the newest batch under `root`.
pub fn locate_artifact(root: &Path, scene: &SceneName) -> Result<PathBuf, LocateError> {
    let batch = newest_batch(root)?;
    find_scene_video(&batch, scene)
}

/// The immediate subdirectory of `root` with the newest modification time.
///
/// Equal times are broken by the lexicographically greatest name.
pub fn newest_batch(root: &Path) -> Result<PathBuf, LocateError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LocateError::NoBatch(root.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut batches: Vec<(SystemTime, OsString, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        batches.push((modified, entry.file_name(), entry.path()));
    }

    batches
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, _, path)| path)
        .ok_or_else(|| LocateError::NoBatch(root.to_path_buf()))
}

/// Search `batch` recursively for a video file whose name contains `scene`.
///
/// A file named exactly `<scene>.<ext>` is preferred over one that merely
/// contains the scene name; among equals the smallest path wins.
pub fn find_scene_video(batch: &Path, scene: &SceneName) -> Result<PathBuf, LocateError> {
    let mut candidates: Vec<(bool, PathBuf)> = Vec::new();

    for entry in WalkDir::new(batch) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !is_video(path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.contains(scene.as_str()) {
            continue;
        }

        let exact = path.file_stem().and_then(|s| s.to_str()) == Some(scene.as_str());
        candidates.push((exact, path.to_path_buf()));
    }

    if candidates.len() > 1 {
        tracing::debug!(
            scene = %scene,
            count = candidates.len(),
            "Multiple videos match scene, choosing deterministically",
        );
    }

    // `true` sorts after `false`, so compare exactness in reverse.
    candidates
        .into_iter()
        .min_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
        .ok_or_else(|| LocateError::NotFound {
            scene: scene.to_string(),
            batch: batch.to_path_buf(),
        })
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
