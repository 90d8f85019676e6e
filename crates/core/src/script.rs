//! Normalization of model-generated script text.
//!
//! The model is told to return bare source, but it occasionally wraps the
//! code in a Markdown fence anyway. The fence lines are removed here; the
//! code itself is passed through untouched.

use crate::error::CoreError;

/// Strip a surrounding Markdown code fence and outer whitespace.
///
/// Only a fence that opens on the first non-empty line is removed, together
/// with the matching closing fence if present. Fences in the middle of the
/// text are left alone.
pub fn normalize_script(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(first_newline) = trimmed.find('\n') else {
        return trimmed.to_string();
    };

    let (first_line, rest) = trimmed.split_at(first_newline);
    if !first_line.trim_start().starts_with("```") {
        return trimmed.to_string();
    }

    let body = rest.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Normalize `raw` and reject it if nothing usable remains.
pub fn prepare_script(raw: &str) -> Result<String, CoreError> {
    let script = normalize_script(raw);
    if script.is_empty() {
        return Err(CoreError::Validation(
            "Generated script is empty".to_string(),
        ));
    }
    Ok(script)
}
