//! Read-only copies of the graph.
//!
//! A `GraphSnapshot` is copied out under the read lock and is then
//! independent of the live graph: the layout engine and service responses
//! work on snapshots, never on live state. The `snapshot_id` is an xxh64
//! digest of the canonical JSON of every record and edge, so two snapshots
//! with the same id describe the same graph.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::graph::GraphState;
use crate::types::{Article, Author, Edge, Entity, EntityKind, Handle, Keyword, Periodical};
use crate::SCHEMA_VERSION;

/// A record together with its handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    /// Handle of the entity.
    pub handle: Handle,
    /// Scalar fields.
    #[serde(flatten)]
    pub record: T,
}

/// Point-in-time copy of the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Deterministic id (xxh64 of schema version, records and edges).
    pub snapshot_id: String,
    /// Schema version of the record types.
    pub schema_version: String,
    /// Live articles in creation order.
    pub articles: Vec<Entry<Article>>,
    /// Live authors in creation order.
    pub authors: Vec<Entry<Author>>,
    /// Live periodicals in creation order.
    pub periodicals: Vec<Entry<Periodical>>,
    /// Live keywords in creation order.
    pub keywords: Vec<Entry<Keyword>>,
    /// All relationship edges in canonical order.
    pub edges: Vec<Edge>,
}

/// Internal struct for computing `snapshot_id`.
#[derive(Serialize)]
struct SnapshotIdInput<'a> {
    schema_version: &'a str,
    articles: &'a [Entry<Article>],
    authors: &'a [Entry<Author>],
    periodicals: &'a [Entry<Periodical>],
    keywords: &'a [Entry<Keyword>],
    edges: &'a [Edge],
}

fn entries<T: Clone>(
    state: &GraphState,
    kind: EntityKind,
    pick: impl Fn(&Entity) -> Option<&T>,
) -> Vec<Entry<T>> {
    state
        .store()
        .live(kind)
        .filter_map(|(handle, e)| {
            pick(e).map(|record| Entry {
                handle,
                record: record.clone(),
            })
        })
        .collect()
}

impl GraphSnapshot {
    /// Copy the current graph state.
    pub fn capture(state: &GraphState) -> Self {
        let mut snapshot = Self {
            snapshot_id: String::new(),
            schema_version: SCHEMA_VERSION.to_string(),
            articles: entries(state, EntityKind::Article, Entity::as_article),
            authors: entries(state, EntityKind::Author, Entity::as_author),
            periodicals: entries(state, EntityKind::Periodical, Entity::as_periodical),
            keywords: entries(state, EntityKind::Keyword, Entity::as_keyword),
            edges: state.index().edges(),
        };
        snapshot.snapshot_id = snapshot.compute_id();
        snapshot
    }

    fn compute_id(&self) -> String {
        canonical_hash_hex(&SnapshotIdInput {
            schema_version: &self.schema_version,
            articles: &self.articles,
            authors: &self.authors,
            periodicals: &self.periodicals,
            keywords: &self.keywords,
            edges: &self.edges,
        })
    }

    /// Whether `snapshot_id` matches the content (e.g. after deserializing).
    pub fn verify(&self) -> bool {
        self.snapshot_id == self.compute_id()
    }

    /// Number of entities of all kinds.
    pub fn entity_count(&self) -> usize {
        self.articles.len() + self.authors.len() + self.periodicals.len() + self.keywords.len()
    }

    /// Handles of the given kinds, in creation order.
    pub fn handles(&self, kinds: &[EntityKind]) -> Vec<Handle> {
        let mut out = Vec::new();
        for kind in kinds {
            match kind {
                EntityKind::Article => out.extend(self.articles.iter().map(|e| e.handle)),
                EntityKind::Author => out.extend(self.authors.iter().map(|e| e.handle)),
                EntityKind::Periodical => out.extend(self.periodicals.iter().map(|e| e.handle)),
                EntityKind::Keyword => out.extend(self.keywords.iter().map(|e| e.handle)),
            }
        }
        // Handles are allocated in creation order.
        out.sort();
        out.dedup();
        out
    }

    /// Label (title, name or keyword) of an entity in the snapshot.
    pub fn label(&self, handle: Handle) -> Option<&str> {
        fn find<'a, T>(list: &'a [Entry<T>], h: Handle, f: fn(&T) -> &str) -> Option<&'a str> {
            list.binary_search_by_key(&h, |e| e.handle)
                .ok()
                .map(|i| f(&list[i].record))
        }
        find(&self.articles, handle, |a| &a.title)
            .or_else(|| find(&self.authors, handle, |a| &a.name))
            .or_else(|| find(&self.periodicals, handle, |p| &p.name))
            .or_else(|| find(&self.keywords, handle, |k| &k.label))
    }
}
