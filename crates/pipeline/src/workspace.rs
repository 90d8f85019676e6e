//! Per-run render workspace.
//!
//! Every pipeline run gets its own directory under the configured work
//! directory. The generated script and the engine's whole media tree live
//! inside it, so removing the workspace removes both, and concurrent runs
//! never see each other's files.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use eduvision_core::types::JobId;
use tempfile::TempDir;

/// Name of the engine output directory inside a workspace.
const MEDIA_DIR_NAME: &str = "media";

/// Scoped ownership of one run's transient files.
///
/// Dropping the workspace deletes it. [`RenderWorkspace::close`] does the
/// same but logs failures, and is what the pipeline calls on its normal exit
/// paths. The drop path covers cancellation and unwinding.
#[derive(Debug)]
pub struct RenderWorkspace {
    job_id: JobId,
    dir: TempDir,
}

impl RenderWorkspace {
    /// Allocate a fresh, uniquely named directory for `job_id` under
    /// `work_dir`, creating `work_dir` if needed.
    pub fn create(work_dir: &Path, job_id: JobId) -> io::Result<Self> {
        std::fs::create_dir_all(work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{job_id}-"))
            .tempdir_in(work_dir)?;

        tracing::debug!(%job_id, path = %dir.path().display(), "Created render workspace");
        Ok(Self { job_id, dir })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory the engine is told to write its output under.
    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join(MEDIA_DIR_NAME)
    }

    /// Write `script` to a uniquely named `.py` file inside the workspace.
    ///
    /// The file is owned by the workspace and removed with it.
    pub fn write_script(&self, script: &str) -> io::Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix("scene_")
            .suffix(".py")
            .tempfile_in(self.dir.path())?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Remove the workspace and everything in it.
    ///
    /// A failure here must not mask the run's own outcome, so it is logged
    /// rather than returned.
    pub fn close(self) {
        let job_id = self.job_id;
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                tracing::debug!(%job_id, path = %path.display(), "Removed render workspace");
            }
            Err(e) => {
                tracing::warn!(
                    %job_id,
                    path = %path.display(),
                    error = %e,
                    "Failed to remove render workspace",
                );
            }
        }
    }
}
