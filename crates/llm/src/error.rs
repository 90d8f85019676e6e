/// Errors from the language-model layer.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No API key is configured.
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("Model request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The model API returned a non-2xx status code.
    #[error("Model API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The reply contained no text (blocked prompt, empty candidate list).
    #[error("Empty response from model: {reason}")]
    EmptyResponse { reason: String },
}
