//! Publishing of rendered artifacts.
//!
//! The artifact is copied into a temporary file next to the destination and
//! then renamed over it, so a reader of the destination path sees either the
//! previous file or the new one, never a partial copy or a mix of two runs.

use std::io;
use std::path::{Path, PathBuf};

use eduvision_core::types::JobId;

/// Copy `artifact` to `dest`, replacing any existing file.
///
/// Missing parent directories of `dest` are created. Returns the number of
/// bytes written.
pub async fn publish(artifact: &Path, dest: &Path) -> io::Result<u64> {
    let artifact = artifact.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || publish_blocking(&artifact, &dest))
        .await
        .map_err(io::Error::other)?
}

fn publish_blocking(artifact: &Path, dest: &Path) -> io::Result<u64> {
    let parent = destination_dir(dest);
    std::fs::create_dir_all(&parent)?;

    let mut source = std::fs::File::open(artifact)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".publish-")
        .tempfile_in(&parent)?;
    let bytes = io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    // Temp files are created owner-only; published videos are served to
    // anyone who can reach the static route.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    staged.persist(dest).map_err(|e| e.error)?;

    tracing::debug!(
        artifact = %artifact.display(),
        dest = %dest.display(),
        bytes,
        "Published artifact",
    );
    Ok(bytes)
}

/// Delete older per-job artifacts in `dir` so that at most `keep` remain,
/// `current` included.
///
/// Only files named `<job id>.<extension>` are candidates, so aliases and
/// foreign files are never touched. Job ids are time-ordered, so sorting by
/// name drops the oldest first. Returns the removed paths.
pub async fn prune_published(
    dir: &Path,
    extension: &str,
    keep: usize,
    current: &Path,
) -> io::Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf();
    let extension = extension.to_string();
    let current = current.to_path_buf();

    tokio::task::spawn_blocking(move || prune_blocking(&dir, &extension, keep, &current))
        .await
        .map_err(io::Error::other)?
}

fn prune_blocking(
    dir: &Path,
    extension: &str,
    keep: usize,
    current: &Path,
) -> io::Result<Vec<PathBuf>> {
    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path == current || !entry.file_type()?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.parse::<JobId>().is_err() {
            continue;
        }
        candidates.push((stem.to_ascii_lowercase(), path));
    }

    candidates.sort();
    let excess = candidates.len().saturating_sub(keep.saturating_sub(1));

    let mut removed = Vec::with_capacity(excess);
    for (_, path) in candidates.into_iter().take(excess) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            // A concurrent prune got there first.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

fn destination_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
