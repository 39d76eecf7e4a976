// src/llm/mock.rs
//! Scripted collaborators for tests and `LLM_TEST_MODE=mock` local runs.
//!
//! Each mock answers from a queue of scripted replies first, then from its
//! responder closure, and counts every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{
    CompletionRequest, LlmError, SearchCompletion, TextCompletionService,
    WebSearchCompletionService,
};

type TextResponder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;
type SearchResponder = Box<dyn Fn(&str) -> Result<SearchCompletion, LlmError> + Send + Sync>;

pub struct MockText {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: TextResponder,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockText {
    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(f),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Same text for every call.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_responder(move |_| Ok(text.clone()))
    }

    /// Same error for every call.
    pub fn failing(err: LlmError) -> Self {
        Self::with_responder(move |_| Err(err.clone()))
    }

    /// Plausible JSON for generation, categorization and fact-check prompts.
    pub fn canned() -> Self {
        Self::with_responder(|req| Ok(canned_text(req)))
    }

    /// Queue one reply ahead of the responder.
    pub fn then(self, reply: Result<String, LlmError>) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextCompletionService for MockText {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(reply) => reply,
            None => (self.responder)(req),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct MockSearch {
    script: Mutex<VecDeque<Result<SearchCompletion, LlmError>>>,
    responder: SearchResponder,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockSearch {
    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<SearchCompletion, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(f),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn always(reply: SearchCompletion) -> Self {
        Self::with_responder(move |_| Ok(reply.clone()))
    }

    pub fn failing(err: LlmError) -> Self {
        Self::with_responder(move |_| Err(err.clone()))
    }

    pub fn canned() -> Self {
        Self::with_responder(|prompt| Ok(canned_search(prompt)))
    }

    pub fn then(self, reply: Result<SearchCompletion, LlmError>) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl WebSearchCompletionService for MockSearch {
    async fn complete_with_search(&self, prompt: &str) -> Result<SearchCompletion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(reply) => reply,
            None => (self.responder)(prompt),
        }
    }

    fn name(&self) -> &'static str {
        "mock-search"
    }
}

fn first_title(user: &str) -> String {
    user.lines()
        .find_map(|l| l.trim().strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Mock story".to_string())
}

fn canned_text(req: &CompletionRequest) -> String {
    let system = req.system.to_lowercase();
    if system.contains("categoriz") {
        return json!({
            "category": "global",
            "sub_category": "general",
            "region": "world",
            "is_gossip": false,
            "confidence": 60
        })
        .to_string();
    }
    if system.contains("fact-check") {
        return json!({
            "score": 65,
            "summary": "Claims look plausible based on general knowledge.",
            "claims": [{"text": "Mock claim", "verdict": "unverified", "explanation": "Not checked."}]
        })
        .to_string();
    }
    let title = first_title(&req.user);
    json!({
        "title": title,
        "summary": format!("Summary of {title}."),
        "body": format!("## {title}\n\n{}", "Mock body text describing the story in neutral terms. ".repeat(8)),
        "fact_score": 70,
        "fact_details": {"claims": []},
        "category": "global",
        "sub_category": "general",
        "interest_tags": [],
        "is_gossip": false
    })
    .to_string()
}

fn canned_search(prompt: &str) -> SearchCompletion {
    if prompt.contains("\"stories\"") {
        return SearchCompletion {
            text: json!({"stories": [{
                "title": "Mock discovery headline about markets",
                "source": "Mock Wire",
                "url": "https://mock.example/markets",
                "summary": "A short mock summary."
            }]})
            .to_string(),
            citation_urls: vec!["https://mock.example/markets".into()],
            search_call_count: 1,
        };
    }
    SearchCompletion {
        text: json!({
            "score": 80,
            "summary": "Main claims are supported by current reporting.",
            "claims": [{"text": "Mock claim", "verdict": "mostly-true", "explanation": "Reported widely."}]
        })
        .to_string(),
        citation_urls: vec!["https://www.mock.example/report".into()],
        search_call_count: 1,
    }
}
