//! Salvage of JSON from free-form model replies.
//!
//! Models wrap JSON in prose, fences, or both. The ladder tries, in order:
//! a fenced code block, a direct parse of the trimmed reply, then the
//! substring between the first `{`/`[` and the last `}`/`]`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    #[error("reply contains no parseable JSON")]
    NoJson,
}

pub fn recover_json(raw: &str) -> Result<Value, RecoveryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecoveryError::NoJson);
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(slice) = bounded_slice(trimmed, open, close) {
            if let Ok(value) = serde_json::from_str(slice) {
                return Ok(value);
            }
        }
    }

    Err(RecoveryError::NoJson)
}

/// Content of the first fenced code block, tolerating a language tag after
/// the opening fence.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map(|idx| idx + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn bounded_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
