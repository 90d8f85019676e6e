use crate::locate::LocateError;
use crate::render::RenderError;

/// Outcome of a pipeline run that did not publish an artifact.
///
/// The variants keep "the engine broke" (`RenderFailed`, `RenderTimeout`)
/// apart from "discovery found nothing" (`ArtifactNotFound`) and from
/// unexpected infrastructure failures (`Render`, `Scan`, `Io`).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Render failed with exit code {exit_code}")]
    RenderFailed { exit_code: i32 },

    #[error("Render timed out after {elapsed_ms}ms")]
    RenderTimeout { elapsed_ms: u64 },

    #[error("Render was cancelled")]
    Cancelled,

    #[error("Rendered video not found: {0}")]
    ArtifactNotFound(#[source] LocateError),

    #[error(transparent)]
    Render(RenderError),

    #[error("Failed to scan render output: {0}")]
    Scan(#[source] LocateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Timeout { elapsed_ms } => Self::RenderTimeout { elapsed_ms },
            RenderError::Cancelled => Self::Cancelled,
            other => Self::Render(other),
        }
    }
}

impl From<LocateError> for PipelineError {
    fn from(err: LocateError) -> Self {
        if err.is_not_found() {
            Self::ArtifactNotFound(err)
        } else {
            Self::Scan(err)
        }
    }
}
