//! Manim command-line renderer.
//!
//! Invokes
//!
//! ```text
//! manim -q<quality> --disable_caching --media_dir <media_dir> <script> <scene>
//! ```
//!
//! Manim writes the final video to
//! `<media_dir>/videos/<script stem>/<resolution>/<Scene>.mp4`.

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::engine::{RenderEngine, RenderError, RenderOutput, RenderRequest};
use super::subprocess;

/// Default renderer binary.
pub const DEFAULT_MANIM_PROGRAM: &str = "manim";

/// Manim's `-q` render quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderQuality {
    /// 480p15, the fast preview preset.
    #[default]
    Low,
    /// 720p30.
    Medium,
    /// 1080p60.
    High,
    /// 1440p60.
    Production,
    /// 2160p60.
    FourK,
}

impl RenderQuality {
    /// The single-letter value passed to `-q`.
    pub fn flag(self) -> char {
        match self {
            Self::Low => 'l',
            Self::Medium => 'm',
            Self::High => 'h',
            Self::Production => 'p',
            Self::FourK => 'k',
        }
    }
}

impl fmt::Display for RenderQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl FromStr for RenderQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::Low),
            "m" | "medium" => Ok(Self::Medium),
            "h" | "high" => Ok(Self::High),
            "p" | "production" => Ok(Self::Production),
            "k" | "4k" | "fourk" => Ok(Self::FourK),
            other => Err(format!(
                "unknown render quality '{other}' (expected one of l, m, h, p, k)"
            )),
        }
    }
}

/// Renders scenes with the Manim CLI.
#[derive(Debug, Clone)]
pub struct ManimEngine {
    program: String,
    /// Arguments placed before the render arguments, e.g. `-m manim` when
    /// the program is a Python interpreter.
    prefix_args: Vec<String>,
    quality: RenderQuality,
}

impl Default for ManimEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MANIM_PROGRAM, RenderQuality::default())
    }
}

impl ManimEngine {
    pub fn new(program: impl Into<String>, quality: RenderQuality) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            quality,
        }
    }

    /// Build an engine from a whitespace-separated command line such as
    /// `python3 -m manim`. Returns `None` for a blank command.
    pub fn from_command_line(command: &str, quality: RenderQuality) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, quality).with_prefix_args(parts))
    }

    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn quality(&self) -> RenderQuality {
        self.quality
    }

    /// Arguments for one invocation. Caching is always disabled so every
    /// render starts from the script on disk.
    pub fn build_args(&self, request: &RenderRequest<'_>) -> Vec<OsString> {
        vec![
            format!("-q{}", self.quality.flag()).into(),
            "--disable_caching".into(),
            "--media_dir".into(),
            request.media_dir.as_os_str().to_owned(),
            request.script_path.as_os_str().to_owned(),
            request.scene.as_str().into(),
        ]
    }
}

impl RenderEngine for ManimEngine {
    async fn render(
        &self,
        request: &RenderRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RenderOutput, RenderError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(self.build_args(request))
            .current_dir(request.working_dir);

        tracing::debug!(
            program = %self.program,
            quality = %self.quality,
            script = %request.script_path.display(),
            scene = %request.scene,
            "Starting render",
        );

        subprocess::run_command(&mut cmd, request.timeout, cancel).await
    }
}
