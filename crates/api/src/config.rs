use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use eduvision_llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use eduvision_llm::GeminiConfig;
use eduvision_pipeline::render::manim::DEFAULT_MANIM_PROGRAM;
use eduvision_pipeline::render::{ManimEngine, RenderQuality};
use eduvision_pipeline::PipelineConfig;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables (or a `.env` file).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`). Must exceed the
    /// render timeout, since a generate request waits for its render.
    pub request_timeout_secs: u64,
    /// Rendering and publishing settings.
    pub render: RenderConfig,
    /// Language model connection settings.
    pub llm: GeminiConfig,
}

/// Rendering, workspace and publishing settings.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Renderer command line, e.g. `manim` or `python3 -m manim`.
    pub manim_command: String,
    pub quality: RenderQuality,
    pub render_timeout_secs: u64,
    /// Parent directory of per-run render workspaces.
    pub work_dir: PathBuf,
    /// Directory published videos are written to and served from.
    pub publish_dir: PathBuf,
    /// URL path `publish_dir` is served under.
    pub public_url_prefix: String,
    /// File name of the latest-video alias; `None` disables it.
    pub latest_name: Option<String>,
    pub max_concurrent_renders: usize,
    /// Per-job videos kept in `publish_dir`; older ones are deleted.
    pub max_published_videos: usize,
}

impl RenderConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            work_dir: self.work_dir.clone(),
            publish_dir: self.publish_dir.clone(),
            latest_name: self.latest_name.clone(),
            render_timeout: Duration::from_secs(self.render_timeout_secs),
            max_concurrent_renders: self.max_concurrent_renders,
            max_published: self.max_published_videos,
        }
    }

    pub fn engine(&self) -> Result<ManimEngine, ConfigError> {
        ManimEngine::from_command_line(&self.manim_command, self.quality).ok_or_else(|| {
            ConfigError::Invalid {
                var: "MANIM_BIN",
                value: self.manim_command.clone(),
                reason: "must not be blank".to_string(),
            }
        })
    }

    /// Client-facing URL of a file inside the publish directory.
    pub fn public_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.public_url_prefix.trim_end_matches('/'),
            file_name
        )
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                                      |
    /// |--------------------------|----------------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                                    |
    /// | `PORT`                   | `5000`                                       |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`                      |
    /// | `REQUEST_TIMEOUT_SECS`   | `600`                                        |
    /// | `MANIM_BIN`              | `manim`                                      |
    /// | `MANIM_QUALITY`          | `l`                                          |
    /// | `RENDER_TIMEOUT_SECS`    | `300`                                        |
    /// | `RENDER_WORK_DIR`        | `<tmp>/eduvision-renders`                    |
    /// | `PUBLISH_DIR`            | `static/videos`                              |
    /// | `PUBLIC_URL_PREFIX`      | `/static/videos`                             |
    /// | `LATEST_VIDEO_NAME`      | `final.mp4` (empty disables)                 |
    /// | `MAX_CONCURRENT_RENDERS` | `1`                                          |
    /// | `MAX_PUBLISHED_VIDEOS`   | `10`                                         |
    /// | `GEMINI_API_KEY`         | unset                                        |
    /// | `GEMINI_MODEL`           | `gemini-2.5-flash`                           |
    /// | `GEMINI_BASE_URL`        | `https://generativelanguage.googleapis.com`  |
    /// | `GEMINI_TEMPERATURE`     | `0`                                          |
    /// | `GEMINI_TIMEOUT_SECS`    | `120`                                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.string("HOST", "0.0.0.0");
        let port: u16 = env.parse("PORT", 5000)?;

        let cors_origins: Vec<String> = env
            .string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env.parse("REQUEST_TIMEOUT_SECS", 600)?;
        let render_timeout_secs: u64 = env.parse("RENDER_TIMEOUT_SECS", 300)?;
        if render_timeout_secs == 0 {
            return Err(env.invalid("RENDER_TIMEOUT_SECS", "must be greater than zero"));
        }
        if request_timeout_secs <= render_timeout_secs {
            return Err(env.invalid(
                "REQUEST_TIMEOUT_SECS",
                &format!("must exceed RENDER_TIMEOUT_SECS ({render_timeout_secs})"),
            ));
        }

        let manim_command = env.string("MANIM_BIN", DEFAULT_MANIM_PROGRAM);
        if manim_command.trim().is_empty() {
            return Err(env.invalid("MANIM_BIN", "must not be blank"));
        }

        let public_url_prefix = env.string("PUBLIC_URL_PREFIX", "/static/videos");
        if !public_url_prefix.starts_with('/') || public_url_prefix.trim_end_matches('/').is_empty()
        {
            return Err(env.invalid(
                "PUBLIC_URL_PREFIX",
                "must start with '/' and name a sub-path",
            ));
        }

        let latest_name = env.string("LATEST_VIDEO_NAME", "final.mp4");
        let latest_name = match latest_name.trim() {
            "" => None,
            name if name.contains(['/', '\\']) || name == "." || name == ".." => {
                return Err(env.invalid("LATEST_VIDEO_NAME", "must be a plain file name"));
            }
            name => Some(name.to_string()),
        };

        let max_concurrent_renders: usize = env.parse("MAX_CONCURRENT_RENDERS", 1)?;
        if max_concurrent_renders == 0 {
            return Err(env.invalid("MAX_CONCURRENT_RENDERS", "must be at least 1"));
        }

        let max_published_videos: usize = env.parse("MAX_PUBLISHED_VIDEOS", 10)?;
        if max_published_videos == 0 {
            return Err(env.invalid("MAX_PUBLISHED_VIDEOS", "must be at least 1"));
        }

        let render = RenderConfig {
            manim_command,
            quality: env.parse("MANIM_QUALITY", RenderQuality::Low)?,
            render_timeout_secs,
            work_dir: env
                .get("RENDER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("eduvision-renders")),
            publish_dir: PathBuf::from(env.string("PUBLISH_DIR", "static/videos")),
            public_url_prefix: public_url_prefix.trim_end_matches('/').to_string(),
            latest_name,
            max_concurrent_renders,
            max_published_videos,
        };

        let llm = GeminiConfig {
            api_key: env.get("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            model: env.string("GEMINI_MODEL", DEFAULT_MODEL),
            base_url: env.string("GEMINI_BASE_URL", DEFAULT_BASE_URL),
            temperature: env.parse("GEMINI_TEMPERATURE", 0.0)?,
            request_timeout: Duration::from_secs(env.parse("GEMINI_TIMEOUT_SECS", 120)?),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            render,
            llm,
        })
    }
}

/// Environment lookup with typed, defaulted accessors.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn invalid(&self, key: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            var: key,
            value: self.get(key).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}
