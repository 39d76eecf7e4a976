// src/dedup/grouping.rs
//! Greedy single-pass topic clustering of raw sources.
//!
//! Each unconsumed item seeds a group and pulls in every later unconsumed
//! item of the same category that shares at least `MIN_SHARED_WORDS`
//! significant words with the seed. Results depend on input order and are not
//! transitive through non-seed members; both are accepted properties of the
//! algorithm.

use std::collections::HashSet;

use serde::Serialize;

use super::{shared_word_count, significant_words};
use crate::model::{ArticleSource, RawSourceItem};

pub const MIN_SHARED_WORDS: usize = 2;

/// Sources judged to concern the same story. First member is the primary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceGroup {
    pub topic: String,
    pub members: Vec<RawSourceItem>,
}

impl SourceGroup {
    pub fn primary(&self) -> &RawSourceItem {
        // Groups are only built by `group_sources`, which always seeds a member.
        &self.members[0]
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn provenance(&self) -> Vec<ArticleSource> {
        self.members.iter().map(ArticleSource::from).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partition `items` into topic groups, preserving seed order.
pub fn group_sources(items: &[RawSourceItem]) -> Vec<SourceGroup> {
    let words: Vec<HashSet<String>> = items.iter().map(|s| significant_words(&s.title)).collect();
    let mut used = vec![false; items.len()];
    let mut groups = Vec::new();

    for (i, seed) in items.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut members = vec![seed.clone()];

        for (j, other) in items.iter().enumerate() {
            if used[j] || other.category != seed.category {
                continue;
            }
            if shared_word_count(&words[i], &words[j]) >= MIN_SHARED_WORDS {
                used[j] = true;
                members.push(other.clone());
            }
        }

        groups.push(SourceGroup {
            topic: seed.title.clone(),
            members,
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SubCategory};
    use chrono::Utc;

    fn item(id: &str, title: &str, category: Category) -> RawSourceItem {
        RawSourceItem {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            url: format!("https://example.dk/{id}"),
            source_name: "Test".into(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            category,
            sub_category: SubCategory::General,
            raw_content: String::new(),
            processed: false,
        }
    }

    #[test]
    fn related_same_category_items_cluster() {
        let items = vec![
            item("1", "Regeringen fremlægger finanslov for 2026", Category::Domestic),
            item("2", "Mærsk skærer i ruter", Category::Domestic),
            item("3", "Ny finanslov: regeringen vil sænke skatten", Category::Domestic),
        ];
        let groups = group_sources(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].member_ids(), vec!["1", "3"]);
        assert_eq!(groups[0].topic, items[0].title);
        assert_eq!(groups[1].member_ids(), vec!["2"]);
    }

    #[test]
    fn different_categories_never_share_a_group() {
        let items = vec![
            item("1", "Regeringen fremlægger finanslov", Category::Domestic),
            item("2", "Regeringen fremlægger finanslov", Category::Global),
        ];
        let groups = group_sources(&items);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn single_shared_word_is_not_enough() {
        let items = vec![
            item("1", "Tesla åbner fabrik i Berlin", Category::Global),
            item("2", "Tesla sænker priserne", Category::Global),
        ];
        assert_eq!(group_sources(&items).len(), 2);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_sources(&[]).is_empty());
    }
}
