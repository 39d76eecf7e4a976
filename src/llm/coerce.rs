// src/llm/coerce.rs
//! Field coercion for model responses. Every response path (generation,
//! categorization, fact-check) applies these same rules.

use serde_json::Value;

use crate::model::{Claim, SourceLink, Verdict, VERDICT_VALUES};

/// Minimum normalized Levenshtein similarity for a near-miss enum value.
const ENUM_SIMILARITY_FLOOR: f64 = 0.75;

/// Map `value` onto one of `allowed` (case-insensitive, exact first, then the
/// closest spelling above a similarity floor); otherwise `fallback`.
pub fn coerce_enum<T: Copy>(value: Option<&Value>, allowed: &[(&str, T)], fallback: T) -> T {
    let Some(raw) = value.and_then(Value::as_str) else {
        return fallback;
    };
    let needle = raw.trim().to_lowercase().replace(['_', ' '], "-");
    if needle.is_empty() {
        return fallback;
    }
    if let Some((_, v)) = allowed.iter().find(|(name, _)| *name == needle) {
        return *v;
    }
    allowed
        .iter()
        .map(|(name, v)| (strsim::normalized_levenshtein(name, &needle), *v))
        .filter(|(sim, _)| *sim >= ENUM_SIMILARITY_FLOOR)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, v)| v)
        .unwrap_or(fallback)
}

/// Integer-ish reading of a JSON value: numbers and numeric strings.
pub fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Score in `[0, 100]`; `default` when absent or non-numeric.
pub fn clamp_score(value: Option<&Value>, default: i32) -> i32 {
    match as_number(value) {
        Some(n) => n.round().clamp(0.0, 100.0) as i32,
        None => default,
    }
}

/// Non-blank trimmed string, else `fallback`.
pub fn text_or(value: Option<&Value>, fallback: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Array of non-blank strings; anything else yields an empty list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Truthiness: `true`, `"true"`/`"yes"`/`"1"`, non-zero numbers.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Claims array from a model response. Entries without text are dropped,
/// unknown verdicts become `unverified`.
pub fn parse_claims(value: Option<&Value>, shared_sources: &[SourceLink]) -> Vec<Claim> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|c| {
            let text = text_or(c.get("text"), "");
            if text.is_empty() {
                return None;
            }
            Some(Claim {
                text,
                verdict: coerce_enum(c.get("verdict"), VERDICT_VALUES, Verdict::Unverified),
                explanation: text_or(c.get("explanation"), ""),
                claim_sources: (!shared_sources.is_empty()).then(|| shared_sources.to_vec()),
            })
        })
        .collect()
}
