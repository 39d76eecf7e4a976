// src/factcheck/prompt.rs

use crate::llm::truncate_chars;

/// Article text sent to either verification path.
pub const CONTENT_CHARS: usize = 4000;

/// Appended to every verdict that did not consult the web.
pub const AI_ONLY_DISCLAIMER: &str =
    "Note: no web sources were consulted; this assessment relies on the model's own knowledge only.";

fn article_block(title: &str, content: &str, source: &str) -> String {
    format!(
        "Source: {source}\nHeadline: {title}\nContent: {}",
        truncate_chars(content, CONTENT_CHARS)
    )
}

pub fn web_search_prompt(title: &str, content: &str, source: &str) -> String {
    format!(
        r#"Verify the following news article.

1. Identify 3-5 concrete, verifiable claims in the text.
2. Search the web for current evidence on each claim.
3. Answer with ONLY one JSON object, no markdown:
{{"score": 0-100, "summary": "overall assessment", "claims": [{{"text": "claim", "verdict": "true|mostly-true|mixed|mostly-false|false|unverified", "explanation": "what the evidence says"}}]}}

{}"#,
        article_block(title, content, source)
    )
}

pub const AI_ONLY_SYSTEM: &str = r#"You are a careful fact-checker without web access. Judge the credibility of the article from your own knowledge only. Be conservative: nothing has been verified externally, so prefer "unverified" when unsure and keep the score moderate.
Answer with one JSON object: {"score": 0-100, "summary": "...", "claims": [{"text": "...", "verdict": "true|mostly-true|mixed|mostly-false|false|unverified", "explanation": "..."}]}"#;

pub fn ai_only_user(title: &str, content: &str, source: &str) -> String {
    article_block(title, content, source)
}
