// src/interest.rs
//! Interest-driven prioritization of raw sources.
//!
//! Each interest contributes at most one point when any of its keywords occurs
//! in the lowercased title + description. Sorting is stable, so equal scores
//! keep discovery order.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::RawSourceItem;

/// Interest names registered by default.
pub const DEFAULT_INTERESTS: &[&str] = &["Tesla", "AI", "Grøn Energi", "Økonomi & Finans", "Renter"];

/// Curated keyword lists for the predefined interests.
const CURATED: &[(&str, &[&str])] = &[
    ("tesla", &["tesla", "elon musk", "cybertruck", "model y", "model 3", "gigafactory"]),
    (
        "ai",
        &[" ai ", "kunstig intelligens", "artificial intelligence", "openai", "chatgpt", "anthropic", "deepmind", "machine learning", "sprogmodel"],
    ),
    (
        "grøn energi",
        &["vindmølle", "solcelle", "vedvarende energi", "grøn omstilling", "renewable", "wind power", "solar", "ørsted", "vestas", "brint", "hydrogen"],
    ),
    (
        "økonomi & finans",
        &["aktie", "børs", "regnskab", "inflation", "økonomi", "finans", "stock", "earnings", "market", "bnp", "gdp"],
    ),
    (
        "renter",
        &["rente", "nationalbanken", "ecb", "federal reserve", " fed ", "interest rate", "pengepolitik", "obligation"],
    ),
    ("politik", &["regeringen", "folketinget", "minister", "valg", "parliament", "election"]),
    ("sundhed", &["sundhed", "hospital", "sygdom", "vaccine", "health", "patient"]),
    ("tech", &["teknologi", "tech", "software", "apple", "google", "microsoft", "smartphone"]),
    ("klima", &["klima", "climate", "co2", "udledning", "emission", "global opvarmning"]),
    ("krypto", &["bitcoin", "krypto", "crypto", "ethereum", "blockchain"]),
    ("ejendomme", &["bolig", "ejendom", "huspriser", "real estate", "housing"]),
    ("sport", &["fodbold", "superliga", "håndbold", "landshold", "football", "champions league"]),
    ("kultur", &["kultur", "film", "musik", "teater", "festival", "koncert"]),
    ("videnskab", &["forskning", "forskere", "videnskab", "science", "study", "rummet"]),
    ("startups", &["startup", "iværksætter", "venture", "investering", "funding round"]),
];

/// Interest name (lowercased) → keywords (lowercased).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordMap {
    entries: HashMap<String, Vec<String>>,
}

impl KeywordMap {
    pub fn curated() -> Self {
        let entries = CURATED
            .iter()
            .map(|(k, kws)| (k.to_string(), kws.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { entries }
    }

    /// Replace or add curated lists (e.g. from config). Keys and keywords are lowercased.
    pub fn with_overrides(mut self, overrides: &HashMap<String, Vec<String>>) -> Self {
        for (name, kws) in overrides {
            let kws: Vec<String> = kws
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if !kws.is_empty() {
                self.entries.insert(name.trim().to_lowercase(), kws);
            }
        }
        self
    }

    /// Add a single-keyword fallback for every name without a curated list.
    pub fn merged<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            let key = name.as_ref().trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            self.entries.entry(key.clone()).or_insert_with(|| vec![key]);
        }
        self
    }

    pub fn keywords_for(&self, interest: &str) -> Option<&[String]> {
        self.entries
            .get(&interest.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number of interests with at least one keyword hit in the item.
pub fn score<S: AsRef<str>>(item: &RawSourceItem, interests: &[S], keywords: &KeywordMap) -> usize {
    // Padded so space-delimited keywords (" ai ") also hit at the edges.
    let haystack = format!(" {} {} ", item.title, item.description).to_lowercase();
    interests
        .iter()
        .filter(|interest| {
            keywords
                .keywords_for(interest.as_ref())
                .is_some_and(|kws| kws.iter().any(|k| haystack.contains(k.as_str())))
        })
        .count()
}

/// Stable sort by descending interest score.
pub fn prioritize<S: AsRef<str>>(
    items: Vec<RawSourceItem>,
    interests: &[S],
    keywords: &KeywordMap,
) -> Vec<RawSourceItem> {
    let mut scored: Vec<(usize, RawSourceItem)> = items
        .into_iter()
        .map(|it| (score(&it, interests, keywords), it))
        .collect();
    scored.sort_by_key(|(s, _)| std::cmp::Reverse(*s));
    scored.into_iter().map(|(_, it)| it).collect()
}

/// Dynamically registered interest names, shared across requests.
#[derive(Debug, Default)]
pub struct InterestRegistry {
    names: RwLock<Vec<String>>,
}

impl InterestRegistry {
    pub fn with_defaults<S: AsRef<str>>(defaults: &[S]) -> Self {
        let reg = Self::default();
        for d in defaults {
            reg.register(d.as_ref());
        }
        reg
    }

    /// Returns `false` for blank or already-known names (case-insensitive).
    pub fn register(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let mut names = self.names.write();
        let key = name.to_lowercase();
        if names.iter().any(|n| n.to_lowercase() == key) {
            return false;
        }
        names.push(name.to_string());
        true
    }

    pub fn names(&self) -> Vec<String> {
        self.names.read().clone()
    }
}
