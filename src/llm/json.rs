// src/llm/json.rs
//! Defensive JSON extraction from model text.
//!
//! Steps, first success wins:
//! 1. drop inline render tags and trim,
//! 2. parse the whole text,
//! 3. parse the body of the first fenced code block,
//! 4. parse the outermost `{ ... }` span.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::LlmError;

static RE_RENDER_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<grok:render.*?</grok:render>").expect("render tag regex"));
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("code fence regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Whole,
    Fenced,
    Braces,
    Done,
}

/// Parse a JSON object out of free-form model output.
pub fn extract_json(raw: &str) -> Result<Value, LlmError> {
    let cleaned = RE_RENDER_TAGS.replace_all(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(LlmError::Empty);
    }

    let mut step = Step::Whole;
    loop {
        let candidate: Option<&str> = match step {
            Step::Whole => Some(cleaned),
            Step::Fenced => RE_FENCE
                .captures(cleaned)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim()),
            Step::Braces => outermost_braces(cleaned),
            Step::Done => {
                return Err(LlmError::Malformed(format!(
                    "no JSON object found in {} chars of output",
                    cleaned.len()
                )))
            }
        };

        if let Some(text) = candidate {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
                return Ok(v);
            }
        }

        step = match step {
            Step::Whole => Step::Fenced,
            Step::Fenced => Step::Braces,
            Step::Braces | Step::Done => Step::Done,
        };
    }
}

fn outermost_braces(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
