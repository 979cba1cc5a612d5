//! Locate a JSON payload inside free-form model output.
//!
//! Two strategies, in order:
//!
//! 1. The first fenced code block (```` ``` ```` with an optional language
//!    tag) whose contents parse as JSON.
//! 2. The first brace-balanced region starting at the first `{`. Only one
//!    candidate is tried; a second balanced region is never searched for.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;

/// Matches the first fenced block, capturing its body.
static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

/// Extract the embedded JSON value from `text`.
///
/// Returns `MalformedInput` when neither strategy yields parseable JSON.
pub fn extract_embedded_json(text: &str) -> Result<Value, CoreError> {
    if let Some(value) = parse_first_fenced_block(text) {
        tracing::debug!("Extracted JSON from fenced code block");
        return Ok(value);
    }

    if let Some(value) = parse_first_balanced_object(text) {
        tracing::debug!("Extracted JSON from brace-balanced region");
        return Ok(value);
    }

    Err(CoreError::malformed("No JSON found in response"))
}

fn parse_first_fenced_block(text: &str) -> Option<Value> {
    let captures = FENCED_BLOCK_RE.captures(text)?;
    let body = captures.get(1)?.as_str().trim();
    serde_json::from_str(body).ok()
}

/// Scan from the first `{` to the point where brace depth returns to zero.
///
/// Braces inside JSON string literals do not count toward depth.
fn parse_first_balanced_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
