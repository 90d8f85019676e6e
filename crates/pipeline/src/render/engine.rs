//! Render engine interface and shared types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eduvision_core::scene::SceneName;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Number of trailing stderr lines kept when logging a failed render.
pub const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// One render invocation.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    /// Script file to render.
    pub script_path: &'a Path,
    /// Scene selected from the script.
    pub scene: &'a SceneName,
    /// Directory the engine writes all of its output under.
    pub media_dir: &'a Path,
    /// Working directory for the child process.
    pub working_dir: &'a Path,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

/// Captured result of a finished render process.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl RenderOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The last `max_lines` lines of stderr, for logging.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Errors that prevent a render process from producing an exit status.
///
/// A process that runs and exits non-zero is not an error at this level; it
/// is reported through [`RenderOutput::exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to start render engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for render engine: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Render was cancelled")]
    Cancelled,
}

/// An external renderer that turns a script file into video files.
pub trait RenderEngine: Send + Sync {
    /// Render `request.scene` from `request.script_path`.
    ///
    /// Must stop the render and return [`RenderError::Cancelled`] once
    /// `cancel` fires, and [`RenderError::Timeout`] once `request.timeout`
    /// elapses.
    fn render(
        &self,
        request: &RenderRequest<'_>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<RenderOutput, RenderError>> + Send;

    /// Root directory holding one sub-directory per render batch.
    fn output_root(&self, media_dir: &Path) -> PathBuf {
        media_dir.join("videos")
    }
}
