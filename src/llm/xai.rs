// src/llm/xai.rs
//! xAI (OpenAI-compatible) HTTP provider: chat completions for plain text and
//! the Responses API with the `web_search` tool for search-augmented calls.
//!
//! Timeouts are applied by the callers (`with_timeout`), so one client serves
//! fast categorization and slow generation alike.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::mock::{MockSearch, MockText};
use super::{
    CompletionRequest, DisabledClient, DynTextCompletion, DynWebSearch, LlmError,
    SearchCompletion, TextCompletionService, WebSearchCompletionService,
};
use crate::config::LlmConfig;

const USER_AGENT: &str = concat!("newsdesk/", env!("CARGO_PKG_VERSION"));
/// Longest error body kept in `LlmError::Status`.
const ERROR_BODY_CHARS: usize = 500;

/// Text and search collaborators built from one config.
#[derive(Clone)]
pub struct LlmClients {
    pub text: DynTextCompletion,
    pub search: DynWebSearch,
}

impl LlmClients {
    pub fn disabled() -> Self {
        Self {
            text: Arc::new(DisabledClient),
            search: Arc::new(DisabledClient),
        }
    }
}

/// Factory:
/// * `LLM_TEST_MODE=mock` gives deterministic mocks,
/// * no resolved API key gives disabled clients,
/// * otherwise the real xAI provider.
pub fn build_clients(cfg: &LlmConfig) -> LlmClients {
    if std::env::var("LLM_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!(target: "generate", "LLM_TEST_MODE=mock, using mock collaborators");
        return LlmClients {
            text: Arc::new(MockText::canned()),
            search: Arc::new(MockSearch::canned()),
        };
    }

    if !cfg.has_key() {
        warn!(target: "generate", "no xAI API key configured; completion collaborators disabled");
        return LlmClients::disabled();
    }

    match XaiClient::new(cfg) {
        Ok(client) => {
            let client = Arc::new(client);
            LlmClients {
                text: client.clone(),
                search: client,
            }
        }
        Err(e) => {
            warn!(target: "generate", error = %e, "building HTTP client failed; collaborators disabled");
            LlmClients::disabled()
        }
    }
}

pub struct XaiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    search_model: String,
    search_temperature: f32,
}

impl XaiClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.trim().to_string(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            chat_model: cfg.chat_model.clone(),
            search_model: cfg.search_model.clone(),
            search_temperature: cfg.search_temperature,
        })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: super::truncate_chars(&text, ERROR_BODY_CHARS).to_string(),
            });
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct SearchReq<'a> {
    model: &'a str,
    input: Vec<Msg<'a>>,
    tools: Vec<Tool>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
    /// Some deployments also list citations at the top level.
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Deserialize)]
struct Annotation {
    #[serde(default)]
    url: Option<String>,
}

/// First choice's message content.
pub(crate) fn parse_chat_body(body: &str) -> Result<String, LlmError> {
    let resp: ChatResp =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(content)
}

/// Output text of the last message part, every distinct citation URL (first
/// seen order) and the number of `web_search_call` items.
pub(crate) fn parse_responses_body(body: &str) -> Result<SearchCompletion, LlmError> {
    let resp: ResponsesBody =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;
    fn push_url(urls: &mut Vec<String>, url: &str) {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }

    let mut out = SearchCompletion::default();

    for item in &resp.output {
        match item.kind.as_str() {
            "web_search_call" => out.search_call_count += 1,
            "message" => {
                for part in item.content.iter().filter(|p| p.kind == "output_text") {
                    out.text = part.text.clone();
                    for url in part.annotations.iter().filter_map(|a| a.url.as_deref()) {
                        push_url(&mut out.citation_urls, url);
                    }
                }
            }
            _ => {}
        }
    }
    for url in &resp.citations {
        push_url(&mut out.citation_urls, url);
    }

    if out.text.trim().is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(out)
}

#[async_trait]
impl TextCompletionService for XaiClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, LlmError> {
        let body = ChatReq {
            model: &self.chat_model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            response_format: req.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let raw = self.post_json("chat/completions", &body).await?;
        parse_chat_body(&raw)
    }

    fn name(&self) -> &'static str {
        "xai"
    }
}

#[async_trait]
impl WebSearchCompletionService for XaiClient {
    async fn complete_with_search(&self, prompt: &str) -> Result<SearchCompletion, LlmError> {
        let body = SearchReq {
            model: &self.search_model,
            input: vec![Msg {
                role: "user",
                content: prompt,
            }],
            tools: vec![Tool { kind: "web_search" }],
            temperature: self.search_temperature,
        };
        let raw = self.post_json("responses", &body).await?;
        parse_responses_body(&raw)
    }

    fn name(&self) -> &'static str {
        "xai-search"
    }
}
