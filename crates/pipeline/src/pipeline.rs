//! Render-and-publish orchestration.
//!
//! [`RenderPipeline::run`] performs one complete run:
//!
//! 1. Acquire a render permit (bounds concurrent renders).
//! 2. Allocate a per-run [`RenderWorkspace`] and write the script into it.
//! 3. Render the scene through the [`RenderEngine`].
//! 4. Locate the scene's video in the newest render batch.
//! 5. Publish it to `<publish_dir>/<job_id>.mp4`, refresh the latest alias,
//!    and prune per-job files beyond the retention limit.
//! 6. Remove the workspace, whatever happened above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eduvision_core::scene::SceneName;
use eduvision_core::types::{JobId, Timestamp};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::locate::locate_artifact;
use crate::publish::{prune_published, publish};
use crate::render::engine::DIAGNOSTIC_TAIL_LINES;
use crate::render::{RenderEngine, RenderRequest};
use crate::workspace::RenderWorkspace;

/// Extension of published artifacts.
pub const PUBLISHED_EXTENSION: &str = "mp4";

/// Filesystem layout and limits for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of all per-run workspaces.
    pub work_dir: PathBuf,
    /// Directory published artifacts are copied into.
    pub publish_dir: PathBuf,
    /// File name inside `publish_dir` that always holds the most recent
    /// successful artifact. `None` disables the alias.
    pub latest_name: Option<String>,
    /// Maximum wall-clock time for one render process.
    pub render_timeout: Duration,
    /// Maximum number of renders running at once (at least 1).
    pub max_concurrent_renders: usize,
    /// Number of per-job artifacts kept in `publish_dir` (at least 1);
    /// older ones are deleted after each publish. The alias is not counted.
    pub max_published: usize,
}

/// A successfully published render.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedArtifact {
    pub job_id: JobId,
    pub scene: SceneName,
    /// Per-job published file.
    pub path: PathBuf,
    /// Latest alias, when enabled.
    pub latest_path: Option<PathBuf>,
    pub bytes: u64,
    pub render_duration_ms: u64,
    pub published_at: Timestamp,
}

impl PublishedArtifact {
    /// File name of the per-job artifact inside the publish directory.
    pub fn file_name(&self) -> String {
        published_file_name(self.job_id)
    }
}

/// File name a job's artifact is published under.
pub fn published_file_name(job_id: JobId) -> String {
    format!("{job_id}.{PUBLISHED_EXTENSION}")
}

/// Sequences workspace, render, locate, publish and cleanup.
pub struct RenderPipeline<E> {
    engine: E,
    config: PipelineConfig,
    permits: Semaphore,
}

impl<E: RenderEngine> RenderPipeline<E> {
    pub fn new(engine: E, config: PipelineConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_renders.max(1));
        Self {
            engine,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Where the artifact for `job_id` is (or will be) published.
    pub fn published_path(&self, job_id: JobId) -> PathBuf {
        self.config.publish_dir.join(published_file_name(job_id))
    }

    /// Where the latest alias lives, if enabled.
    pub fn latest_path(&self) -> Option<PathBuf> {
        self.config
            .latest_name
            .as_ref()
            .map(|name| self.config.publish_dir.join(name))
    }

    /// Render `scene` from `script` and publish the resulting video.
    ///
    /// Nothing is copied to the publish directory unless the render exits
    /// zero and a matching video is found. The run's workspace is removed
    /// on every exit path.
    #[tracing::instrument(skip_all, fields(job_id = %job_id, scene = %scene))]
    pub async fn run(
        &self,
        job_id: JobId,
        script: &str,
        scene: &SceneName,
        cancel: &CancellationToken,
    ) -> Result<PublishedArtifact, PipelineError> {
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| PipelineError::Cancelled)?,
        };

        let workspace = RenderWorkspace::create(&self.config.work_dir, job_id)?;
        let result = self.run_in(&workspace, script, scene, cancel).await;
        workspace.close();

        match &result {
            Ok(artifact) => tracing::info!(
                path = %artifact.path.display(),
                bytes = artifact.bytes,
                "Render published",
            ),
            Err(e) => tracing::warn!(error = %e, "Render pipeline failed"),
        }
        result
    }

    async fn run_in(
        &self,
        workspace: &RenderWorkspace,
        script: &str,
        scene: &SceneName,
        cancel: &CancellationToken,
    ) -> Result<PublishedArtifact, PipelineError> {
        let job_id = workspace.job_id();
        let script_path = workspace.write_script(script)?;
        let media_dir = workspace.media_dir();

        let request = RenderRequest {
            script_path: &script_path,
            scene,
            media_dir: &media_dir,
            working_dir: workspace.path(),
            timeout: self.config.render_timeout,
        };
        let output = self.engine.render(&request, cancel).await?;

        if !output.success() {
            tracing::error!(
                exit_code = output.exit_code,
                duration_ms = output.duration_ms,
                stderr = %output.stderr_tail(DIAGNOSTIC_TAIL_LINES),
                "Render engine exited with failure",
            );
            return Err(PipelineError::RenderFailed {
                exit_code: output.exit_code,
            });
        }
        tracing::info!(duration_ms = output.duration_ms, "Render finished");

        let artifact = self.locate(&media_dir, scene).await?;
        tracing::debug!(artifact = %artifact.display(), "Located rendered video");

        let path = self.published_path(job_id);
        let bytes = publish(&artifact, &path).await?;

        let latest_path = match self.latest_path() {
            Some(latest) => {
                if let Err(e) = publish(&artifact, &latest).await {
                    // A failed run leaves nothing published.
                    if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                        tracing::warn!(
                            error = %cleanup,
                            path = %path.display(),
                            "Failed to remove per-job artifact after alias failure",
                        );
                    }
                    return Err(e.into());
                }
                Some(latest)
            }
            None => None,
        };

        self.prune(&path).await;

        Ok(PublishedArtifact {
            job_id,
            scene: scene.clone(),
            path,
            latest_path,
            bytes,
            render_duration_ms: output.duration_ms,
            published_at: chrono::Utc::now(),
        })
    }

    /// Apply the retention limit. Failures are logged; the run already
    /// succeeded.
    async fn prune(&self, current: &Path) {
        let keep = self.config.max_published.max(1);
        match prune_published(&self.config.publish_dir, PUBLISHED_EXTENSION, keep, current).await {
            Ok(removed) if !removed.is_empty() => {
                tracing::debug!(removed = removed.len(), keep, "Pruned old published videos");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to prune old published videos"),
        }
    }

    async fn locate(&self, media_dir: &Path, scene: &SceneName) -> Result<PathBuf, PipelineError> {
        let root = self.engine.output_root(media_dir);
        let scene = scene.clone();
        let found = tokio::task::spawn_blocking(move || locate_artifact(&root, &scene))
            .await
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        Ok(found?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;

    use super::*;
    use crate::render::{RenderError, RenderOutput};

    /// What the fake engine does when asked to render.
    #[derive(Clone)]
    enum Behavior {
        /// Write these files (relative to `<media>/videos/<batch>/`) and exit 0.
        Produce(Vec<(&'static str, Vec<u8>)>),
        /// Write nothing and exit with the given code.
        Exit(i32),
        /// Wait until timed out or cancelled.
        Hang,
    }

    struct FakeEngine {
        behavior: Behavior,
        seen: Mutex<Vec<(PathBuf, PathBuf)>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl FakeEngine {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                seen: Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }

        /// Script paths and media dirs of every render so far.
        fn seen(&self) -> Vec<(PathBuf, PathBuf)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl RenderEngine for FakeEngine {
        async fn render(
            &self,
            request: &RenderRequest<'_>,
            cancel: &CancellationToken,
        ) -> Result<RenderOutput, RenderError> {
            assert!(request.script_path.exists(), "script must exist during render");
            self.seen.lock().unwrap().push((
                request.script_path.to_path_buf(),
                request.media_dir.to_path_buf(),
            ));

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            let ok = |exit_code| RenderOutput {
                stdout: String::new(),
                stderr: "Traceback: NameError".to_string(),
                exit_code,
                duration_ms: 20,
            };

            match &self.behavior {
                Behavior::Produce(files) => {
                    let stem = request.script_path.file_stem().unwrap();
                    let batch = request.media_dir.join("videos").join(stem);
                    for (rel, bytes) in files {
                        let path = batch.join(rel);
                        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                        std::fs::write(path, bytes).unwrap();
                    }
                    Ok(ok(0))
                }
                Behavior::Exit(code) => Ok(ok(*code)),
                Behavior::Hang => {
                    tokio::select! {
                        () = cancel.cancelled() => Err(RenderError::Cancelled),
                        () = tokio::time::sleep(request.timeout) => Err(RenderError::Timeout {
                            elapsed_ms: request.timeout.as_millis() as u64,
                        }),
                    }
                }
            }
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        config: PipelineConfig,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            work_dir: root.path().join("work"),
            publish_dir: root.path().join("static/videos"),
            latest_name: Some("final.mp4".to_string()),
            render_timeout: Duration::from_secs(5),
            max_concurrent_renders: 1,
            max_published: 10,
        };
        Fixture {
            _root: root,
            config,
        }
    }

    fn scene(name: &str) -> SceneName {
        SceneName::parse(name).unwrap()
    }

    fn assert_workspace_gone(engine: &FakeEngine, config: &PipelineConfig) {
        for (script, media) in engine.seen() {
            assert!(!script.exists(), "script {} left behind", script.display());
            assert!(!media.exists(), "media dir {} left behind", media.display());
        }
        let leftovers: Vec<_> = std::fs::read_dir(&config.work_dir)
            .map(|entries| entries.map(|e| e.unwrap().path()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "workspaces left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn publishes_byte_identical_artifact() {
        let fx = fixture();
        let engine = FakeEngine::new(Behavior::Produce(vec![(
            "480p15/Orbit.mp4",
            b"orbit video".to_vec(),
        )]));
        let pipeline = RenderPipeline::new(engine, fx.config.clone());
        let job_id = JobId::new();

        let artifact = pipeline
            .run(job_id, "class Orbit(Scene): pass", &scene("Orbit"), &CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(artifact.job_id, job_id);
        assert_eq!(artifact.path, fx.config.publish_dir.join(format!("{job_id}.mp4")));
        assert_eq!(artifact.file_name(), format!("{job_id}.mp4"));
        assert_eq!(artifact.bytes, 11);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"orbit video");

        let latest = artifact.latest_path.clone().expect("latest alias enabled");
        assert_eq!(latest, fx.config.publish_dir.join("final.mp4"));
        assert_eq!(std::fs::read(latest).unwrap(), b"orbit video");

        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn script_text_reaches_the_engine() {
        struct Capture(Mutex<String>);
        impl RenderEngine for Capture {
            async fn render(
                &self,
                request: &RenderRequest<'_>,
                _cancel: &CancellationToken,
            ) -> Result<RenderOutput, RenderError> {
                *self.0.lock().unwrap() = std::fs::read_to_string(request.script_path).unwrap();
                Ok(RenderOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: 1,
                    duration_ms: 0,
                })
            }
        }

        let fx = fixture();
        let pipeline = RenderPipeline::new(Capture(Mutex::new(String::new())), fx.config.clone());
        let _ = pipeline
            .run(JobId::new(), "from manim import *", &scene("A"), &CancellationToken::new())
            .await;

        assert_eq!(*pipeline.engine().0.lock().unwrap(), "from manim import *");
    }

    #[tokio::test]
    async fn render_failure_copies_nothing() {
        let fx = fixture();
        let pipeline = RenderPipeline::new(FakeEngine::new(Behavior::Exit(1)), fx.config.clone());
        let job_id = JobId::new();

        let result = pipeline
            .run(job_id, "broken", &scene("A"), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(PipelineError::RenderFailed { exit_code: 1 }));
        assert!(!pipeline.published_path(job_id).exists());
        assert!(!fx.config.publish_dir.join("final.mp4").exists());
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn missing_scene_video_is_artifact_not_found() {
        let fx = fixture();
        let engine = FakeEngine::new(Behavior::Produce(vec![(
            "480p15/SomethingElse.mp4",
            b"other".to_vec(),
        )]));
        let pipeline = RenderPipeline::new(engine, fx.config.clone());
        let job_id = JobId::new();

        let result = pipeline
            .run(job_id, "class Orbit(Scene): pass", &scene("Orbit"), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(PipelineError::ArtifactNotFound(_)));
        assert!(!pipeline.published_path(job_id).exists());
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn no_output_at_all_is_artifact_not_found() {
        let fx = fixture();
        let pipeline =
            RenderPipeline::new(FakeEngine::new(Behavior::Produce(vec![])), fx.config.clone());

        let result = pipeline
            .run(JobId::new(), "x", &scene("Orbit"), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(PipelineError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn second_run_replaces_latest_alias() {
        let fx = fixture();

        let first = RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("480p15/A.mp4", b"first run".to_vec())])),
            fx.config.clone(),
        );
        let a = first
            .run(JobId::new(), "class A(Scene): pass", &scene("A"), &CancellationToken::new())
            .await
            .expect("first run");

        let second = RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("480p15/B.mp4", b"2nd".to_vec())])),
            fx.config.clone(),
        );
        let b = second
            .run(JobId::new(), "class B(Scene): pass", &scene("B"), &CancellationToken::new())
            .await
            .expect("second run");

        let latest = fx.config.publish_dir.join("final.mp4");
        assert_eq!(std::fs::read(&latest).unwrap(), b"2nd");
        // Per-job files are independent.
        assert_eq!(std::fs::read(&a.path).unwrap(), b"first run");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"2nd");
    }

    #[tokio::test]
    async fn old_job_files_are_pruned_beyond_limit() {
        let mut fx = fixture();
        fx.config.max_published = 2;
        let pipeline = RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("A.mp4", b"v".to_vec())])),
            fx.config.clone(),
        );

        let mut published = Vec::new();
        for _ in 0..3 {
            let artifact = pipeline
                .run(JobId::new(), "class A(Scene): pass", &scene("A"), &CancellationToken::new())
                .await
                .expect("run");
            published.push(artifact.path);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert!(!published[0].exists(), "oldest job file must be pruned");
        assert!(published[1].exists());
        assert!(published[2].exists());
        assert!(fx.config.publish_dir.join("final.mp4").exists());
    }

    #[tokio::test]
    async fn alias_failure_unpublishes_job_file() {
        let fx = fixture();
        // A directory where the alias should go makes the rename fail.
        std::fs::create_dir_all(fx.config.publish_dir.join("final.mp4").join("blocker")).unwrap();
        let pipeline = RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("A.mp4", b"v".to_vec())])),
            fx.config.clone(),
        );
        let job_id = JobId::new();

        let result = pipeline
            .run(job_id, "class A(Scene): pass", &scene("A"), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(PipelineError::Io(_)));
        assert!(!pipeline.published_path(job_id).exists());
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn latest_alias_can_be_disabled() {
        let mut fx = fixture();
        fx.config.latest_name = None;
        let pipeline = RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("A.mp4", b"v".to_vec())])),
            fx.config.clone(),
        );

        let artifact = pipeline
            .run(JobId::new(), "class A(Scene): pass", &scene("A"), &CancellationToken::new())
            .await
            .expect("run");

        assert!(artifact.latest_path.is_none());
        assert!(!fx.config.publish_dir.join("final.mp4").exists());
    }

    #[tokio::test]
    async fn timeout_is_reported_and_cleaned_up() {
        let mut fx = fixture();
        fx.config.render_timeout = Duration::from_millis(100);
        let pipeline = RenderPipeline::new(FakeEngine::new(Behavior::Hang), fx.config.clone());

        let result = pipeline
            .run(JobId::new(), "x", &scene("A"), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(PipelineError::RenderTimeout { .. }));
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn cancellation_stops_render_and_cleans_up() {
        let fx = fixture();
        let pipeline = RenderPipeline::new(FakeEngine::new(Behavior::Hang), fx.config.clone());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = pipeline.run(JobId::new(), "x", &scene("A"), &cancel).await;

        assert_matches!(result, Err(PipelineError::Cancelled));
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_render() {
        let fx = fixture();
        let pipeline = RenderPipeline::new(FakeEngine::new(Behavior::Exit(0)), fx.config.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = pipeline.run(JobId::new(), "x", &scene("A"), &cancel).await;

        assert_matches!(result, Err(PipelineError::Cancelled));
        assert!(pipeline.engine().seen().is_empty());
    }

    #[tokio::test]
    async fn renders_are_serialized_by_default() {
        let fx = fixture();
        let pipeline = Arc::new(RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("A.mp4", b"v".to_vec())])),
            fx.config.clone(),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline
                    .run(JobId::new(), "class A(Scene): pass", &scene("A"), &CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().expect("run");
        }

        assert_eq!(pipeline.engine().max_running.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.engine().seen().len(), 4);
        assert_workspace_gone(pipeline.engine(), &fx.config);
    }

    #[tokio::test]
    async fn concurrent_runs_use_isolated_workspaces() {
        let mut fx = fixture();
        fx.config.max_concurrent_renders = 4;
        let pipeline = Arc::new(RenderPipeline::new(
            FakeEngine::new(Behavior::Produce(vec![("A.mp4", b"v".to_vec())])),
            fx.config.clone(),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline
                    .run(JobId::new(), "class A(Scene): pass", &scene("A"), &CancellationToken::new())
                    .await
            }));
        }
        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().expect("run").path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);

        let media_dirs: std::collections::HashSet<_> = pipeline
            .engine()
            .seen()
            .into_iter()
            .map(|(_, media)| media)
            .collect();
        assert_eq!(media_dirs.len(), 4);
    }
}
