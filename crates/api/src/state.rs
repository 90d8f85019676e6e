use std::sync::Arc;

use eduvision_llm::ScriptGenerator;
use eduvision_pipeline::render::ManimEngine;
use eduvision_pipeline::RenderPipeline;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via axum's `State` extractor.
///
/// Cloning is cheap: every field is an `Arc` or a token handle.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Turns a topic into script text.
    pub generator: Arc<dyn ScriptGenerator>,
    /// Render-and-publish pipeline.
    pub pipeline: Arc<RenderPipeline<ManimEngine>>,
    /// Cancelled on graceful shutdown; aborts in-flight renders.
    pub shutdown: CancellationToken,
}
