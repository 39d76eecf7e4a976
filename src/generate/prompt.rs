// src/generate/prompt.rs
//! Prompt text for article synthesis.

use chrono::{DateTime, Utc};

use crate::dedup::SourceGroup;
use crate::llm::truncate_chars;

pub fn system_prompt(language: &str) -> String {
    format!(
        r#"You are a professional news journalist. Write one original {language} article based on the sources provided.

RULES:
- Write in {language}; be objective and factual.
- Use your own wording, never copy sentences from the sources.
- Include every important fact from the sources and never mention that you are an AI.
- Use markdown in the body (## headings, **bold**, lists). The body must be at least 200 words.
- Assess every concrete claim against the sources and give an overall fact_score from 0 to 100.
- Compare publication dates with today's date. If the sources describe old news that is no longer current, return {{"skip": true}} and nothing else.

INTEREST TAGS: optional and strict. Most articles get an empty array. Only tag an interest when the article is directly and primarily about it.

CATEGORY: one of "domestic", "regional", "global", "soft-news". SUB_CATEGORY: "general" or "finance".

Answer with one JSON object:
{{
  "title": "Clear headline",
  "summary": "One or two sentences",
  "body": "Full markdown article",
  "fact_score": 85,
  "fact_details": {{"claims": [{{"text": "Claim", "verdict": "true", "explanation": "Why"}}]}},
  "category": "domestic",
  "sub_category": "general",
  "interest_tags": [],
  "is_gossip": false,
  "skip": false
}}
Allowed verdicts: true, mostly-true, mixed, mostly-false, false, unverified."#
    )
}

/// Date context, interest context and every member's title, description,
/// excerpted content and URL.
pub fn user_prompt<S: AsRef<str>>(
    group: &SourceGroup,
    interests: &[S],
    excerpt_chars: usize,
    now: DateTime<Utc>,
) -> String {
    let mut out = format!(
        "Today is {} (UTC). Prefer the newest developments.\n",
        now.format("%A %-d %B %Y, %H:%M")
    );
    if !interests.is_empty() {
        let names: Vec<&str> = interests.iter().map(AsRef::as_ref).collect();
        out.push_str(&format!("Reader interests (valid tags): {}\n", names.join(", ")));
    }
    out.push('\n');

    let blocks: Vec<String> = group
        .members
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let description = if s.description.trim().is_empty() {
                "(none)"
            } else {
                s.description.trim()
            };
            format!(
                "Source {}: {}\nTitle: {}\nDescription: {}\nContent: {}\nURL: {}\nPublished: {}",
                i + 1,
                s.source_name,
                s.title,
                description,
                truncate_chars(&s.raw_content, excerpt_chars),
                s.url,
                s.published_at.format("%Y-%m-%d %H:%M UTC"),
            )
        })
        .collect();
    out.push_str(&blocks.join("\n---\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, RawSourceItem, SubCategory};
    use chrono::TimeZone;

    #[test]
    fn user_prompt_lists_members_and_truncates_content() {
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
        let member = |id: &str| RawSourceItem {
            id: id.into(),
            title: format!("Headline {id}"),
            description: String::new(),
            url: format!("https://example.com/{id}"),
            source_name: "DR".into(),
            published_at: now,
            fetched_at: now,
            category: Category::Domestic,
            sub_category: SubCategory::General,
            raw_content: "x".repeat(3000),
            processed: false,
        };
        let group = SourceGroup {
            topic: "Headline a".into(),
            members: vec![member("a"), member("b")],
        };
        let p = user_prompt(&group, &["Tesla"], 1500, now);
        assert!(p.contains("Today is Wednesday 1 October 2025"));
        assert!(p.contains("Reader interests (valid tags): Tesla"));
        assert!(p.contains("Title: Headline a"));
        assert!(p.contains("Source 2: DR"));
        assert!(p.contains("Description: (none)"));
        assert!(!p.contains(&"x".repeat(1501)));
    }

    #[test]
    fn system_prompt_names_language_and_skip() {
        let s = system_prompt("Danish");
        assert!(s.contains("original Danish article"));
        assert!(s.contains("\"skip\": true"));
    }
}
