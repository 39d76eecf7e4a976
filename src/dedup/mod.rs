// src/dedup/mod.rs
//! Headline comparison: normalization, significant words, Jaccard similarity
//! and the duplicate guard used before and after article generation.

pub mod grouping;

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;

pub use grouping::{group_sources, SourceGroup};

/// Jaccard similarity above which two headlines are the same story.
pub const DUPLICATE_THRESHOLD: f64 = 0.6;

/// Letters kept beyond ASCII `a-z` and digits.
const EXTRA_LETTERS: &str = "æøåäöüéèêëáàâíìîóòôúùûñçß";

/// Longest suffix by which two significant words may differ and still match
/// (`aktie` / `aktien`, `rate` / `rates`).
const INFLECTION_SLACK: usize = 2;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Danish
        "efter", "over", "under", "uden", "ikke", "denne", "dette", "disse", "mere", "mest",
        "andre", "andet", "mange", "nogle", "skal", "ville", "have", "være", "blev",
        "bliver", "også", "eller",
        // English
        "when", "what", "that", "this", "with", "from", "they", "their", "about", "than",
        "will", "been", "just", "more", "some", "other", "into", "could",
    ]
    .into_iter()
    .collect()
});

fn keep_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || EXTRA_LETTERS.contains(c)
}

/// Canonical form of a headline: lowercase, allowlisted characters only,
/// single spaces, trimmed. Idempotent.
pub fn normalize_title(title: &str) -> String {
    let filtered: String = title
        .to_lowercase()
        .chars()
        .filter(|c| keep_char(*c))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokens of the normalized title longer than 3 characters, minus stop words.
pub fn significant_words(title: &str) -> HashSet<String> {
    normalize_title(title)
        .split(' ')
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Equal, or one word extends the other by at most `INFLECTION_SLACK` characters.
fn words_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (a_n, b_n) = (a.chars().count(), b.chars().count());
    let (short, long, short_n, long_n) = if a_n <= b_n {
        (a, b, a_n, b_n)
    } else {
        (b, a, b_n, a_n)
    };
    short_n >= 4 && long_n - short_n <= INFLECTION_SLACK && long.starts_with(short)
}

fn matched_in(words: &HashSet<String>, other: &HashSet<String>) -> usize {
    words
        .iter()
        .filter(|w| other.contains(*w) || other.iter().any(|o| words_match(w, o)))
        .count()
}

/// Number of shared significant words between two word sets. Symmetric.
pub fn shared_word_count(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    matched_in(a, b).min(matched_in(b, a))
}

/// Intersection over union of two word sets; 0 when either is empty.
pub fn jaccard_sets(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = shared_word_count(a, b);
    let union = a.len() + b.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

/// Jaccard similarity of the significant words of two headlines, in `[0, 1]`.
pub fn jaccard(a: &str, b: &str) -> f64 {
    jaccard_sets(&significant_words(a), &significant_words(b))
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DuplicateCheck {
    pub is_dup: bool,
    pub matched_title: Option<String>,
    pub similarity: Option<f64>,
}

impl DuplicateCheck {
    /// Short human-readable description for run summaries.
    pub fn describe(&self, candidate: &str) -> String {
        format!(
            "\"{}\" ~ \"{}\" ({}%)",
            candidate,
            self.matched_title.as_deref().unwrap_or_default(),
            (self.similarity.unwrap_or(0.0) * 100.0).round() as i64
        )
    }
}

/// First existing title that is the same story as `candidate`, if any.
///
/// Exact match after normalization gives similarity 1.0; otherwise Jaccard
/// must exceed `DUPLICATE_THRESHOLD`. Existing titles are scanned in order.
pub fn is_duplicate(candidate: &str, existing_titles: &[String]) -> DuplicateCheck {
    let norm = normalize_title(candidate);
    let words = significant_words(candidate);
    for existing in existing_titles {
        if normalize_title(existing) == norm {
            return DuplicateCheck {
                is_dup: true,
                matched_title: Some(existing.clone()),
                similarity: Some(1.0),
            };
        }
        let sim = jaccard_sets(&words, &significant_words(existing));
        if sim > DUPLICATE_THRESHOLD {
            return DuplicateCheck {
                is_dup: true,
                matched_title: Some(existing.clone()),
                similarity: Some(sim),
            };
        }
    }
    DuplicateCheck::default()
}

/// First 12 hex chars of the SHA-256 of `text`.
pub fn short_digest(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Digest of the normalized headline; log lines carry this instead of the text.
pub fn title_digest(title: &str) -> String {
    short_digest(&normalize_title(title))
}

/// URL dedup key: lowercase, trailing `/` removed.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_nordic_letters_and_collapses_ws() {
        assert_eq!(
            normalize_title("  Ørsted: Grøn   strøm — 2025!  "),
            "ørsted grøn strøm 2025"
        );
        assert_eq!(normalize_title("Åbne Ålborg"), "åbne ålborg");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["Hello,  WORLD!", "Ærø: ÆBLE-høst", "  \t mixed\nlines  ", "İstanbul ß"] {
            let once = normalize_title(s);
            assert_eq!(normalize_title(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn significant_words_drop_short_and_stop_words() {
        let w = significant_words("Regeringen vil have nye regler efter valget i år");
        assert!(w.contains("regeringen"));
        assert!(w.contains("regler"));
        assert!(w.contains("valget"));
        assert!(!w.contains("have"));
        assert!(!w.contains("efter"));
        assert!(!w.contains("nye"));
    }

    #[test]
    fn jaccard_identity_symmetry_and_empty() {
        let a = "Vestas vinder stor ordre i Tyskland";
        let b = "Stor ordre til Vestas fra Tyskland";
        assert_eq!(jaccard(a, a), 1.0);
        assert_eq!(jaccard(a, b), jaccard(b, a));
        assert_eq!(jaccard("a an the", a), 0.0);
        assert_eq!(jaccard("", ""), 0.0);
    }

    #[test]
    fn inflected_forms_match() {
        assert!(words_match("aktie", "aktien"));
        assert!(words_match("rates", "rate"));
        assert!(!words_match("nord", "nordisk"));
        assert!(!words_match("stiger", "stigende"));
    }

    #[test]
    fn duplicate_exact_after_normalization() {
        let existing = vec!["Fed holder renten uændret!".to_string()];
        let r = is_duplicate("fed HOLDER renten   uændret", &existing);
        assert!(r.is_dup);
        assert_eq!(r.similarity, Some(1.0));
    }

    #[test]
    fn duplicate_fuzzy_novo_headline() {
        let existing = vec!["Novo Nordisk aktien stiger efter regnskab".to_string()];
        let r = is_duplicate("Novo Nordisk aktie stiger kraftigt efter regnskab", &existing);
        assert!(r.is_dup);
        assert!(r.similarity.unwrap() > DUPLICATE_THRESHOLD);
        assert_eq!(r.matched_title.as_deref(), Some(existing[0].as_str()));
    }

    #[test]
    fn first_match_wins_and_unrelated_passes() {
        let existing = vec![
            "Storm rammer Vestjylland i nat".to_string(),
            "Storm rammer Vestjylland i nat igen".to_string(),
        ];
        let r = is_duplicate("Storm rammer Vestjylland", &existing);
        assert!(r.is_dup);
        assert_eq!(r.matched_title.as_deref(), Some(existing[0].as_str()));

        let r = is_duplicate("Mærsk skærer i ruter til Asien", &existing);
        assert!(!r.is_dup);
        assert!(r.matched_title.is_none());
    }

    #[test]
    fn url_key_ignores_case_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://DR.dk/Nyheder/1/"),
            normalize_url("https://dr.dk/nyheder/1")
        );
    }
}
