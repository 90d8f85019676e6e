use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use eduvision_llm::GeminiClient;
use eduvision_pipeline::RenderPipeline;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eduvision_api::config::ServerConfig;
use eduvision_api::router::build_app_router;
use eduvision_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "eduvision_api=debug,eduvision_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    if config.llm.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; generate requests will fail");
    }

    // --- Filesystem ---
    tokio::fs::create_dir_all(&config.render.publish_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create publish directory {}",
                config.render.publish_dir.display()
            )
        })?;
    tokio::fs::create_dir_all(&config.render.work_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create render work directory {}",
                config.render.work_dir.display()
            )
        })?;

    // --- Model client ---
    let generator = GeminiClient::new(config.llm.clone()).context("Failed to build model client")?;
    tracing::info!(model = %config.llm.model, "Model client ready");

    // --- Render pipeline ---
    let engine = config.render.engine()?;
    tracing::info!(
        program = engine.program(),
        quality = %engine.quality(),
        max_concurrent = config.render.max_concurrent_renders,
        "Render pipeline ready",
    );
    let pipeline = RenderPipeline::new(engine, config.render.pipeline_config());

    // --- App state ---
    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(config.clone()),
        generator: Arc::new(generator),
        pipeline: Arc::new(pipeline),
        shutdown: shutdown.clone(),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Abort in-flight renders so their connections can drain.
            signal_token.cancel();
        })
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
