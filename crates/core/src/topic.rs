//! Topic validation for incoming generate requests.

use crate::error::CoreError;

/// Maximum topic length in characters.
pub const MAX_TOPIC_LENGTH: usize = 2_000;

/// Validate a topic and return it trimmed.
pub fn validate_topic(topic: &str) -> Result<&str, CoreError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(CoreError::Validation(
            "Topic must not be empty".to_string(),
        ));
    }
    let len = topic.chars().count();
    if len > MAX_TOPIC_LENGTH {
        return Err(CoreError::Validation(format!(
            "Topic exceeds maximum length of {MAX_TOPIC_LENGTH} characters (got {len})"
        )));
    }
    Ok(topic)
}
