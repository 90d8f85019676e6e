//! REST client for the Gemini `generateContent` endpoint.
//!
//! Sends the system instruction and one user turn, and returns the text of
//! the first candidate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::prompt::{user_instruction, SYSTEM_PROMPT};
use crate::ScriptGenerator;

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key; requests fail with [`LlmError::MissingApiKey`] when unset.
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL without trailing slash, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Subset of the `generateContent` response the client reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    pub fn into_text(self) -> Result<String, LlmError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(LlmError::EmptyResponse {
                reason: block_reason
                    .map(|r| format!("prompt blocked: {r}"))
                    .unwrap_or_else(|| "no candidates".to_string()),
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                reason: candidate
                    .finish_reason
                    .map(|r| format!("finish reason {r}"))
                    .unwrap_or_else(|| "no text".to_string()),
            });
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one Gemini model.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send one generation request with the given system and user text.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed.into_text()
    }
}

#[async_trait::async_trait]
impl ScriptGenerator for GeminiClient {
    async fn generate_script(&self, topic: &str) -> Result<String, LlmError> {
        tracing::debug!(model = %self.config.model, "Requesting script from model");
        let script = self.generate(SYSTEM_PROMPT, &user_instruction(topic)).await?;
        tracing::debug!(chars = script.len(), "Model returned script");
        Ok(script)
    }
}
