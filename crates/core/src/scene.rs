//! Scene identifier extraction.
//!
//! The rendering engine renders one named scene per invocation. The name is
//! read from the generated script by matching the first `class X(Scene)`
//! declaration; scripts without one fall back to [`FALLBACK_SCENE_NAME`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Scene name used when the script declares no recognizable scene class.
pub const FALLBACK_SCENE_NAME: &str = "Scene";

/// Matches `class <Name>(Scene)` with arbitrary whitespace around the parens.
pub const SCENE_DECLARATION_PATTERN: &str =
    r"class\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*Scene\s*\)";

static SCENE_DECLARATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SCENE_DECLARATION_PATTERN).expect("valid regex"));

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// A scene identifier.
///
/// Always matches `[A-Za-z_][A-Za-z0-9_]*`, so it is safe both as a file
/// name fragment and as the engine's scene-selection argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SceneName(String);

impl SceneName {
    /// Accept `name` only if it is a plain identifier.
    pub fn parse(name: &str) -> Option<Self> {
        IDENTIFIER_RE
            .is_match(name)
            .then(|| Self(name.to_string()))
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_SCENE_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_SCENE_NAME
    }
}

impl AsRef<str> for SceneName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the scene to render from script text.
///
/// Returns the name of the first `class X(Scene)` declaration, or the
/// fallback name when there is none.
pub fn extract_scene_name(script: &str) -> SceneName {
    SCENE_DECLARATION_RE
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| SceneName(m.as_str().to_string()))
        .unwrap_or_else(SceneName::fallback)
}
