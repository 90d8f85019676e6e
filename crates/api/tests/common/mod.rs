#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use eduvision_api::config::{RenderConfig, ServerConfig};
use eduvision_api::router::build_app_router;
use eduvision_api::state::AppState;
use eduvision_llm::gemini::GeminiConfig;
use eduvision_llm::{LlmError, ScriptGenerator};
use eduvision_pipeline::render::{ManimEngine, RenderQuality};
use eduvision_pipeline::RenderPipeline;

/// Stand-in for `manim`: writes the script itself as the "video", so each
/// run's artifact carries that run's script bytes.
///
/// Arguments: `-q<x> --disable_caching --media_dir <media> <script> <scene>`.
/// A script containing `RENDER_FAIL` exits 1, one containing `NO_OUTPUT`
/// exits 0 without writing anything, and `SLOW_RENDER` sleeps 3s first.
const FAKE_MANIM: &str = r#"media="$4"
script="$5"
scene="$6"
if grep -q RENDER_FAIL "$script"; then
  echo "Traceback (most recent call last): boom" >&2
  exit 1
fi
if grep -q SLOW_RENDER "$script"; then
  sleep 3
fi
if grep -q NO_OUTPUT "$script"; then
  exit 0
fi
stem=$(basename "$script" .py)
out="$media/videos/$stem/480p15"
mkdir -p "$out"
cat "$script" > "$out/$scene.mp4"
"#;

/// Script generator returning canned replies in order (the last one repeats).
pub struct StubGenerator {
    replies: Mutex<Vec<Result<String, String>>>,
    pub topics: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn replying(script: &str) -> Self {
        Self::sequence(vec![Ok(script.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::sequence(vec![Err(message.to_string())])
    }

    pub fn sequence(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            topics: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ScriptGenerator for StubGenerator {
    async fn generate_script(&self, topic: &str) -> Result<String, LlmError> {
        self.topics.lock().unwrap().push(topic.to_string());
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies[0].clone()
        };
        reply.map_err(|body| LlmError::Api { status: 503, body })
    }
}

/// A router wired to temporary directories and a fake renderer.
pub struct TestApp {
    pub app: Router,
    pub config: ServerConfig,
    pub generator: Arc<StubGenerator>,
    pub shutdown: CancellationToken,
    root: TempDir,
}

impl TestApp {
    pub fn publish_dir(&self) -> &Path {
        &self.config.render.publish_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.render.work_dir
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

/// Build a test `ServerConfig` rooted at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        render: RenderConfig {
            manim_command: "sh".to_string(),
            quality: RenderQuality::Low,
            render_timeout_secs: 10,
            work_dir: root.join("work"),
            publish_dir: root.join("static").join("videos"),
            public_url_prefix: "/static/videos".to_string(),
            latest_name: Some("final.mp4".to_string()),
            max_concurrent_renders: 1,
            max_published_videos: 10,
        },
        llm: GeminiConfig::default(),
    }
}

/// Build the full application router with the production middleware stack,
/// a stub generator and the fake renderer.
pub fn build_test_app(generator: StubGenerator) -> TestApp {
    build_test_app_with(generator, |_| {})
}

/// Like [`build_test_app`], letting the caller adjust the config first.
pub fn build_test_app_with(
    generator: StubGenerator,
    adjust: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let root = tempfile::tempdir().expect("create test root");
    let fake = root.path().join("fake-manim.sh");
    std::fs::write(&fake, FAKE_MANIM).expect("write fake renderer");

    let mut config = test_config(root.path());
    adjust(&mut config);
    std::fs::create_dir_all(&config.render.publish_dir).expect("create publish dir");

    let engine = ManimEngine::new("sh", config.render.quality)
        .with_prefix_args([fake.to_string_lossy().into_owned()]);
    let pipeline = RenderPipeline::new(engine, config.render.pipeline_config());

    let generator = Arc::new(generator);
    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(config.clone()),
        generator: generator.clone(),
        pipeline: Arc::new(pipeline),
        shutdown: shutdown.clone(),
    };

    TestApp {
        app: build_app_router(state, &config),
        config,
        generator,
        shutdown,
        root,
    }
}

/// A well-formed script declaring `scene`.
pub fn scene_script(scene: &str, body: &str) -> String {
    format!(
        "from manim import *\n\nclass {scene}(Scene):\n    def construct(self):\n        {body}\n"
    )
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    post_raw(app, uri, "application/json", body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, content_type: &str, body: String) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Entries directly under `dir`, sorted.
pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}
