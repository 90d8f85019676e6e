pub mod generate;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate                                        topic -> published video (POST)
/// ```
///
/// `/generate` is also mounted at the root (see [`crate::router`]).
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(generate::router())
}
