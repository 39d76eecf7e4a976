//! LLM collaborators: provider abstraction, typed failures, timeouts, and the
//! shared parsing helpers every response path goes through.

pub mod coerce;
pub mod json;
pub mod mock;
pub mod xai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use json::extract_json;

/// Failure of a completion call. Timeouts are treated like any other error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    /// Missing credentials or endpoint. Surfaced as "service unavailable".
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty completion")]
    Empty,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LlmError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, LlmError::NotConfigured(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e.to_string())
    }
}

/// One chat-style completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the provider for a JSON object response.
    pub json: bool,
}

impl CompletionRequest {
    pub fn json(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
            json: true,
        }
    }
}

/// Text answer of a search-augmented completion plus what it cited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCompletion {
    pub text: String,
    pub citation_urls: Vec<String>,
    pub search_call_count: u32,
}

/// Plain text completion (generation, categorization, fact-check fallback).
#[async_trait]
pub trait TextCompletionService: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, LlmError>;
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool {
        true
    }
}

/// Web-search augmented completion (fact-check primary path, news discovery).
#[async_trait]
pub trait WebSearchCompletionService: Send + Sync {
    async fn complete_with_search(&self, prompt: &str) -> Result<SearchCompletion, LlmError>;
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool {
        true
    }
}

pub type DynTextCompletion = Arc<dyn TextCompletionService>;
pub type DynWebSearch = Arc<dyn WebSearchCompletionService>;

/// Run `fut` under `limit`; firing drops (aborts) the in-flight request.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(LlmError::Timeout(limit)),
    }
}

/// Always fails with `NotConfigured`; used when credentials are absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClient;

#[async_trait]
impl TextCompletionService for DisabledClient {
    async fn complete(&self, _req: &CompletionRequest) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured("text completion"))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl WebSearchCompletionService for DisabledClient {
    async fn complete_with_search(&self, _prompt: &str) -> Result<SearchCompletion, LlmError> {
        Err(LlmError::NotConfigured("web-search completion"))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_configured(&self) -> bool {
        false
    }
}

/// Truncate a string to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_surfaces_as_typed_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, LlmError>(1)
        };
        let err = with_timeout(Duration::from_millis(10), slow).await.unwrap_err();
        assert_eq!(err, LlmError::Timeout(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn disabled_client_reports_not_configured() {
        let c = DisabledClient;
        let err = TextCompletionService::complete(&c, &CompletionRequest::json("s", "u", 0.1))
            .await
            .unwrap_err();
        assert!(err.is_not_configured());
        assert!(!TextCompletionService::is_configured(&c));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("Ærø ø", 3), "Ærø");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
