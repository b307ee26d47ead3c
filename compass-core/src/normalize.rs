//! Recovering JSON payloads from free-form model output.
//!
//! Models asked for "JSON only" still wrap it in code fences or add a sentence
//! before and after. The extraction here is deliberately small:
//!
//! 1. trim, then strip one leading fence (```` ``` ```` or ```` ```json ````) and
//!    one trailing fence;
//! 2. try to parse what is left;
//! 3. otherwise take the text from the first `{` to the brace that closes it
//!    (plain depth counting, braces inside strings are not special) and parse that.
//!
//! It is not a relaxed JSON parser: `{a:1}` stays invalid.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why no JSON value could be recovered.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("response is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoObject,

    #[error("unbalanced braces in object starting at byte {0}")]
    Unbalanced(usize),

    #[error("extracted text is not valid JSON: {0}")]
    Invalid(#[source] serde_json::Error),

    #[error("JSON does not match the expected shape: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Strip one optional leading and one optional trailing code fence.
pub fn strip_fences(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix("```") {
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        cleaned = rest.trim_start();
    }

    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim_end();
    }

    cleaned
}

/// Slice from the first `{` to the `}` that brings the depth back to zero.
pub fn balanced_object(text: &str) -> Result<&str, NormalizeError> {
    let start = text.find('{').ok_or(NormalizeError::NoObject)?;

    let mut depth = 0usize;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(NormalizeError::Unbalanced(start))
}

/// Extract a JSON value from model output.
pub fn extract_json(text: &str) -> Result<Value, NormalizeError> {
    let cleaned = strip_fences(text);
    if cleaned.is_empty() {
        return Err(NormalizeError::Empty);
    }

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => tracing::debug!("Direct JSON parse failed: {e}"),
    }

    let candidate = balanced_object(cleaned)?;
    serde_json::from_str(candidate).map_err(|e| {
        let preview: String = candidate.chars().take(200).collect();
        tracing::debug!("Extracted JSON parse failed: {e}; text: {preview}");
        NormalizeError::Invalid(e)
    })
}

/// Extract a JSON value, or `None` if nothing parseable is found.
pub fn parse_response(text: &str) -> Option<Value> {
    extract_json(text).ok()
}

/// Extract a JSON value and deserialize it into a typed shape.
///
/// Unknown enum values (a `"type": "deity"` node, say) fail here with
/// [`NormalizeError::Schema`] instead of leaking into the graph.
pub fn parse_typed<T: DeserializeOwned>(text: &str) -> Result<T, NormalizeError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(NormalizeError::Schema)
}
