//! Near-duplicate detection.
//!
//! Pairwise Levenshtein comparison of normalized labels (title, name or
//! keyword label) within one entity kind. Results are suggestions only;
//! deciding which pairs to merge is up to the caller, which then uses
//! [`GraphState::merge_entities`](crate::graph::GraphState::merge_entities).

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::graph::GraphState;
use crate::normalize::normalize_key;
use crate::types::{EntityKind, Handle};

/// A pair of live entities with similar labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearDuplicate {
    /// Older entity of the pair.
    pub first: Handle,
    /// Newer entity of the pair.
    pub second: Handle,
    /// Levenshtein distance between the normalized labels.
    pub distance: usize,
}

/// Pairs of live entities of `kind` whose normalized labels are within
/// `max_distance` edits of each other.
///
/// Pairs are reported in store order (`first < second`). Entities with a
/// blank label are skipped. Article pairs must also agree on the year when
/// both have one, so that a paper and its later erratum are not flagged.
pub fn find_near_duplicates(
    state: &GraphState,
    kind: EntityKind,
    max_distance: usize,
) -> Vec<NearDuplicate> {
    let entries: Vec<(Handle, String, Option<i32>)> = state
        .store()
        .live(kind)
        .filter_map(|(h, e)| {
            let label = normalize_key(e.label());
            if label.is_empty() {
                return None;
            }
            let year = e.as_article().and_then(|a| a.year);
            Some((h, label, year))
        })
        .collect();

    let mut pairs = Vec::new();
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (first, a, year_a) = &entries[i];
            let (second, b, year_b) = &entries[j];
            if let (Some(x), Some(y)) = (year_a, year_b) {
                if x != y {
                    continue;
                }
            }
            // Length difference is a lower bound on the edit distance.
            if a.chars().count().abs_diff(b.chars().count()) > max_distance {
                continue;
            }
            let distance = levenshtein(a, b);
            if distance <= max_distance {
                pairs.push(NearDuplicate {
                    first: *first,
                    second: *second,
                    distance,
                });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeConfig;
    use crate::types::{Article, Author};

    #[test]
    fn test_finds_typo_variants() {
        let mut state = GraphState::new(MergeConfig::default());
        let a = state.insert_entity(Author::new("Jane Doe"));
        let b = state.insert_entity(Author::new("Jane Doa"));
        state.insert_entity(Author::new("John Smith"));

        let pairs = find_near_duplicates(&state, EntityKind::Author, 2);
        assert_eq!(
            pairs,
            vec![NearDuplicate {
                first: a,
                second: b,
                distance: 1
            }]
        );
        assert!(find_near_duplicates(&state, EntityKind::Author, 0).is_empty());
    }

    #[test]
    fn test_article_years_must_agree() {
        let mut state = GraphState::new(MergeConfig::default());
        let mut a = Article::new("Snowballing in Software Engineering");
        a.year = Some(2014);
        let mut b = Article::new("Snowballing in Software Engineering.");
        b.year = Some(2015);
        let mut c = Article::new("Snowbaling in Software Engineering");
        c.year = Some(2014);
        let ha = state.insert_entity(a);
        state.insert_entity(b);
        let hc = state.insert_entity(c);

        let pairs = find_near_duplicates(&state, EntityKind::Article, 2);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].first, pairs[0].second), (ha, hc));
    }
}
