use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    renderer: String,
    publish_dir_ready: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let publish_dir_ready = tokio::fs::metadata(&state.pipeline.config().publish_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        renderer: state.pipeline.engine().program().to_string(),
        publish_dir_ready,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
