//! Language-model client that turns a topic into an animation script.
//!
//! [`ScriptGenerator`] is the seam used by the HTTP layer;
//! [`gemini::GeminiClient`] implements it against the Gemini REST API.

pub mod error;
pub mod gemini;
pub mod prompt;

pub use error::LlmError;
pub use gemini::{GeminiClient, GeminiConfig};

/// Produces animation script text for a topic.
#[async_trait::async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Ask the model for a script animating `topic`. Returns the raw reply
    /// text; callers normalize it.
    async fn generate_script(&self, topic: &str) -> Result<String, LlmError>;
}
