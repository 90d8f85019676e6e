use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eduvision_core::error::CoreError;
use eduvision_llm::LlmError;
use eduvision_pipeline::PipelineError;
use serde_json::json;

/// Message returned for a missing or empty `prompt` field.
pub const MISSING_PROMPT: &str = "Missing 'prompt' field";

/// Application-level error type for HTTP handlers.
///
/// Wraps the error of every layer the generate flow crosses and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `eduvision_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A render/publish failure from `eduvision_pipeline`.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Script generation failed in `eduvision_llm`.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// The request exceeded the server's request timeout.
    #[error("Request timed out")]
    RequestTimeout,
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        msg.clone(),
                    )
                }
            },

            // --- Pipeline errors ---
            AppError::Pipeline(err) => classify_pipeline_error(err),

            // --- Generation errors ---
            AppError::Llm(err) => {
                tracing::error!(error = %err, "Script generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_FAILED",
                    err.to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    msg.clone(),
                )
            }
            AppError::RequestTimeout => {
                tracing::warn!("Request timed out");
                (
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "Request timed out".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a pipeline error into an HTTP status, error code, and message.
///
/// Render diagnostics were already logged by the pipeline; only the short
/// failure class reaches the client.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::RenderFailed { exit_code } => {
            tracing::error!(exit_code, "Render failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RENDER_FAILED",
                "Manim failed to render".to_string(),
            )
        }
        PipelineError::RenderTimeout { elapsed_ms } => {
            tracing::error!(elapsed_ms, "Render timed out");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RENDER_TIMEOUT",
                format!("Render timed out after {}s", elapsed_ms / 1000),
            )
        }
        PipelineError::ArtifactNotFound(source) => {
            tracing::error!(error = %source, "Rendered video not found");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ARTIFACT_NOT_FOUND",
                "Rendered video not found".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Pipeline error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                other.to_string(),
            )
        }
    }
}
