//! Handler for the generate endpoint: topic in, published video URL out.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use eduvision_core::scene::extract_scene_name;
use eduvision_core::script::prepare_script;
use eduvision_core::topic::validate_topic;
use eduvision_core::types::JobId;
use eduvision_llm::LlmError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, MISSING_PROMPT};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Topic to animate.
    pub prompt: Option<String>,
}

/// Successful generate response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// URL of this request's video.
    pub video_url: String,
    /// URL of the latest-video alias, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_url: Option<String>,
    pub job_id: JobId,
    pub scene: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generate
///
/// Ask the model for a script, render it and publish the video. The request
/// stays open until the render finishes.
pub async fn generate_animation(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<Json<GenerateResponse>> {
    let prompt = match body {
        Ok(Json(GenerateRequest {
            prompt: Some(prompt),
        })) if !prompt.trim().is_empty() => prompt,
        Ok(_) => return Err(AppError::BadRequest(MISSING_PROMPT.to_string())),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected generate body");
            return Err(AppError::BadRequest(MISSING_PROMPT.to_string()));
        }
    };
    let topic = validate_topic(&prompt)?;

    let job_id = JobId::new();
    tracing::info!(%job_id, topic, "Generating animation");

    let raw = state.generator.generate_script(topic).await?;
    let script = prepare_script(&raw).map_err(|e| LlmError::EmptyResponse {
        reason: e.to_string(),
    })?;
    let scene = extract_scene_name(&script);
    if scene.is_fallback() {
        tracing::warn!(%job_id, "No scene class declared, using fallback scene name");
    }

    let artifact = state
        .pipeline
        .run(job_id, &script, &scene, &state.shutdown)
        .await?;

    let render = &state.config.render;
    let latest_url = artifact
        .latest_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|name| render.public_url(&name.to_string_lossy()));

    Ok(Json(GenerateResponse {
        status: "success",
        video_url: render.public_url(&artifact.file_name()),
        latest_url,
        job_id,
        scene: artifact.scene.to_string(),
    }))
}
