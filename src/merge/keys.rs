//! Merge-key index.
//!
//! Maps every normalized match key to the live handles claiming it. The map
//! values are lists, not single handles, so that a uniqueness violation
//! (two live entities with one DOI, e.g. from a restored document) is
//! observable and can be surfaced as `ConflictingIdentity` instead of being
//! silently resolved.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalize::{non_blank, normalize_doi, normalize_issn, normalize_key, title_year_key};
use crate::types::{Entity, Handle};

/// How authors are keyed for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKeyPolicy {
    /// Normalized full name only. Affiliation is supplementary data.
    Name,
    /// Normalized full name plus normalized affiliation. Same-named authors
    /// at different institutions stay separate.
    NameAndAffiliation,
}

impl Default for AuthorKeyPolicy {
    fn default() -> Self {
        Self::Name
    }
}

/// Kind of match key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    /// Article DOI (strong key).
    Doi,
    /// Article title + year.
    TitleYear,
    /// Author name (possibly with affiliation).
    AuthorName,
    /// Periodical name.
    PeriodicalName,
    /// Periodical ISSN.
    PeriodicalIssn,
    /// Keyword label.
    KeywordLabel,
}

impl KeyKind {
    /// Whether two live entities sharing this key violate a uniqueness invariant.
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Doi | Self::AuthorName)
    }
}

/// Author key under a policy.
pub fn author_key(name: &str, affiliation: Option<&str>, policy: AuthorKeyPolicy) -> Option<String> {
    let name = normalize_key(name);
    if name.is_empty() {
        return None;
    }
    Some(match policy {
        AuthorKeyPolicy::Name => name,
        AuthorKeyPolicy::NameAndAffiliation => {
            let affiliation = non_blank(affiliation).map(normalize_key).unwrap_or_default();
            format!("{}|{}", name, affiliation)
        }
    })
}

/// All match keys of an entity.
pub fn keys_of(entity: &Entity, policy: AuthorKeyPolicy) -> Vec<(KeyKind, String)> {
    let mut keys = Vec::new();
    match entity {
        Entity::Article(a) => {
            if let Some(doi) = a.doi.as_deref().and_then(normalize_doi) {
                keys.push((KeyKind::Doi, doi));
            }
            if let Some(k) = title_year_key(&a.title, a.year) {
                keys.push((KeyKind::TitleYear, k));
            }
        }
        Entity::Author(a) => {
            if let Some(k) = author_key(&a.name, a.affiliation.as_deref(), policy) {
                keys.push((KeyKind::AuthorName, k));
            }
        }
        Entity::Periodical(p) => {
            let name = normalize_key(&p.name);
            if !name.is_empty() {
                keys.push((KeyKind::PeriodicalName, name));
            }
            if let Some(issn) = p.issn.as_deref().and_then(normalize_issn) {
                keys.push((KeyKind::PeriodicalIssn, issn));
            }
        }
        Entity::Keyword(k) => {
            let label = normalize_key(&k.label);
            if !label.is_empty() {
                keys.push((KeyKind::KeywordLabel, label));
            }
        }
    }
    keys
}

/// Index from match keys to live handles.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    policy: AuthorKeyPolicy,
    entries: HashMap<(KeyKind, String), Vec<Handle>>,
}

impl KeyIndex {
    /// Create an empty key index.
    pub fn new(policy: AuthorKeyPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    /// Author key policy in effect.
    pub fn policy(&self) -> AuthorKeyPolicy {
        self.policy
    }

    /// Register all keys of an entity.
    pub fn insert(&mut self, handle: Handle, entity: &Entity) {
        for key in keys_of(entity, self.policy) {
            let list = self.entries.entry(key).or_default();
            if !list.contains(&handle) {
                list.push(handle);
                list.sort();
            }
        }
    }

    /// Unregister all keys of an entity.
    pub fn remove(&mut self, handle: Handle, entity: &Entity) {
        for key in keys_of(entity, self.policy) {
            if let Some(list) = self.entries.get_mut(&key) {
                list.retain(|h| *h != handle);
                if list.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Live handles claiming a key, oldest first.
    pub fn lookup(&self, kind: KeyKind, key: &str) -> &[Handle] {
        self.entries
            .get(&(kind, key.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Keys of unique kinds claimed by more than one handle.
    pub fn violations(&self) -> Vec<(KeyKind, String, Vec<Handle>)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .filter(|((kind, _), list)| kind.is_unique() && list.len() > 1)
            .map(|((kind, key), list)| (*kind, key.clone(), list.clone()))
            .collect();
        out.sort();
        out
    }
}
