//! Persisted graph documents.
//!
//! ## Format (version "1.0")
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "exported_at": "2024-01-01T00:00:00Z",
//!   "articles":    [{ ...fields, "authors": [i], "periodical": i?, "keywords": [i], "references": [i] }],
//!   "authors":     [{ ...fields }],
//!   "periodicals": [{ ...fields }],
//!   "keywords":    [{ ...fields }]
//! }
//! ```
//!
//! Relationships are positions in the sibling arrays, not handles: handles
//! are process-local and a restored graph allocates fresh ones. Restoring
//! does not merge; a document that contains duplicates restores them as
//! separate entities, and later lookups on the duplicated key report
//! `ConflictingIdentity`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::canonical::canonical_hash_hex;
use crate::error::{GraphError, GraphResult};
use crate::graph::GraphState;
use crate::merge::MergeConfig;
use crate::types::{Article, Author, Entity, EntityKind, Handle, Keyword, Periodical, RelationKind};

/// Current document format version.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Article entry of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleEntry {
    /// Scalar fields.
    #[serde(flatten)]
    pub record: Article,
    /// Positions in `authors`, in credited order.
    #[serde(default)]
    pub authors: Vec<usize>,
    /// Position in `periodicals`.
    #[serde(default)]
    pub periodical: Option<usize>,
    /// Positions in `keywords`.
    #[serde(default)]
    pub keywords: Vec<usize>,
    /// Positions in `articles` of the cited articles.
    #[serde(default)]
    pub references: Vec<usize>,
}

/// Serialized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version; must be [`DOCUMENT_VERSION`].
    pub version: String,
    /// Export time. Not part of [`GraphDocument::content_hash`].
    pub exported_at: DateTime<Utc>,
    /// Articles with their relationships.
    #[serde(default)]
    pub articles: Vec<ArticleEntry>,
    /// Authors.
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Periodicals.
    #[serde(default)]
    pub periodicals: Vec<Periodical>,
    /// Keywords.
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

/// Internal struct for computing the content hash.
#[derive(Serialize)]
struct DocumentContent<'a> {
    version: &'a str,
    articles: &'a [ArticleEntry],
    authors: &'a [Author],
    periodicals: &'a [Periodical],
    keywords: &'a [Keyword],
}

fn positions(state: &GraphState, kind: EntityKind) -> (Vec<Handle>, HashMap<Handle, usize>) {
    let handles = state.store().handles(kind);
    let lookup = handles.iter().enumerate().map(|(i, h)| (*h, i)).collect();
    (handles, lookup)
}

fn map_positions(handles: Vec<Handle>, lookup: &HashMap<Handle, usize>) -> Vec<usize> {
    handles.iter().filter_map(|h| lookup.get(h).copied()).collect()
}

fn check_position(kind: &str, owner: usize, position: usize, len: usize) -> GraphResult<()> {
    if position >= len {
        return Err(GraphError::Document(format!(
            "article {} references {} {} but only {} exist",
            owner, kind, position, len
        )));
    }
    Ok(())
}

impl GraphDocument {
    /// Export a graph state.
    pub fn export(state: &GraphState) -> Self {
        let (article_handles, article_pos) = positions(state, EntityKind::Article);
        let (author_handles, author_pos) = positions(state, EntityKind::Author);
        let (periodical_handles, periodical_pos) = positions(state, EntityKind::Periodical);
        let (keyword_handles, keyword_pos) = positions(state, EntityKind::Keyword);
        let index = state.index();

        let articles = article_handles
            .iter()
            .filter_map(|&h| {
                let record = state.store().article(h).ok()?.clone();
                Some(ArticleEntry {
                    record,
                    authors: map_positions(index.targets(RelationKind::AuthoredBy, h), &author_pos),
                    periodical: index
                        .targets(RelationKind::PublishedIn, h)
                        .first()
                        .and_then(|p| periodical_pos.get(p).copied()),
                    keywords: map_positions(index.targets(RelationKind::TaggedWith, h), &keyword_pos),
                    references: map_positions(index.targets(RelationKind::Cites, h), &article_pos),
                })
            })
            .collect();

        fn records<T: Clone>(
            state: &GraphState,
            handles: &[Handle],
            pick: impl Fn(&Entity) -> Option<&T>,
        ) -> Vec<T> {
            handles
                .iter()
                .filter_map(|h| state.store().get(*h).ok().and_then(|e| pick(e)).cloned())
                .collect()
        }

        Self {
            version: DOCUMENT_VERSION.to_string(),
            exported_at: Utc::now(),
            articles,
            authors: records(state, &author_handles, Entity::as_author),
            periodicals: records(state, &periodical_handles, Entity::as_periodical),
            keywords: records(state, &keyword_handles, Entity::as_keyword),
        }
    }

    /// Hash of the document content, independent of `exported_at`.
    pub fn content_hash(&self) -> String {
        canonical_hash_hex(&DocumentContent {
            version: &self.version,
            articles: &self.articles,
            authors: &self.authors,
            periodicals: &self.periodicals,
            keywords: &self.keywords,
        })
    }

    /// Check version and every relationship position.
    pub fn validate(&self) -> GraphResult<()> {
        if self.version != DOCUMENT_VERSION {
            return Err(GraphError::Document(format!(
                "unsupported version '{}', expected '{}'",
                self.version, DOCUMENT_VERSION
            )));
        }
        for (i, entry) in self.articles.iter().enumerate() {
            for &p in &entry.authors {
                check_position("author", i, p, self.authors.len())?;
            }
            if let Some(p) = entry.periodical {
                check_position("periodical", i, p, self.periodicals.len())?;
            }
            for &p in &entry.keywords {
                check_position("keyword", i, p, self.keywords.len())?;
            }
            for &p in &entry.references {
                check_position("article", i, p, self.articles.len())?;
            }
        }
        Ok(())
    }

    /// Rebuild a graph state from the document.
    ///
    /// Entities are created in document order (articles, authors,
    /// periodicals, keywords), so restored handles are fresh.
    pub fn restore(&self, config: MergeConfig) -> GraphResult<GraphState> {
        self.validate()?;
        let mut state = GraphState::new(config);

        let articles: Vec<Handle> = self
            .articles
            .iter()
            .map(|e| state.insert_entity(e.record.clone()))
            .collect();
        let authors: Vec<Handle> = self.authors.iter().map(|a| state.insert_entity(a.clone())).collect();
        let periodicals: Vec<Handle> = self
            .periodicals
            .iter()
            .map(|p| state.insert_entity(p.clone()))
            .collect();
        let keywords: Vec<Handle> = self.keywords.iter().map(|k| state.insert_entity(k.clone())).collect();

        for (entry, &article) in self.articles.iter().zip(&articles) {
            for &p in &entry.authors {
                state.link(RelationKind::AuthoredBy, article, authors[p])?;
            }
            if let Some(p) = entry.periodical {
                state.link(RelationKind::PublishedIn, article, periodicals[p])?;
            }
            for &p in &entry.keywords {
                state.link(RelationKind::TaggedWith, article, keywords[p])?;
            }
            for &p in &entry.references {
                state.link(RelationKind::Cites, article, articles[p])?;
            }
        }

        info!(
            articles = articles.len(),
            authors = authors.len(),
            periodicals = periodicals.len(),
            keywords = keywords.len(),
            edges = state.index().len(),
            "Graph document restored"
        );
        Ok(state)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> GraphResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| GraphError::Document(e.to_string()))
    }

    /// Parse from JSON (without validating positions).
    pub fn from_json(json: &str) -> GraphResult<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::Document(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArticleCandidate, AuthorCandidate, KeywordCandidate, PeriodicalCandidate};

    fn sample() -> GraphState {
        let mut state = GraphState::new(MergeConfig::default());
        state
            .submit_article(
                &ArticleCandidate::new("B")
                    .with_doi("10.1/b")
                    .with_author(AuthorCandidate::new("Jane Doe"))
                    .with_author(AuthorCandidate::new("John Roe"))
                    .with_periodical(PeriodicalCandidate::new("Nature"))
                    .with_keyword(KeywordCandidate::new("graphs"))
                    .citing(ArticleCandidate::new("A").with_doi("10.1/a")),
            )
            .unwrap();
        state
    }

    #[test]
    fn test_export_uses_positions() {
        let doc = GraphDocument::export(&sample());

        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.articles.len(), 2);
        let b = &doc.articles[0];
        assert_eq!(b.record.title, "B");
        assert_eq!(b.authors, vec![0, 1]);
        assert_eq!(b.periodical, Some(0));
        assert_eq!(b.keywords, vec![0]);
        assert_eq!(b.references, vec![1]);
    }

    #[test]
    fn test_restore_preserves_content() {
        let doc = GraphDocument::export(&sample());
        let json = doc.to_json().unwrap();
        let parsed = GraphDocument::from_json(&json).unwrap();
        let restored = parsed.restore(MergeConfig::default()).unwrap();

        let again = GraphDocument::export(&restored);
        assert_eq!(again.content_hash(), doc.content_hash());
        restored.check_invariants().unwrap();
    }

    #[test]
    fn test_content_hash_ignores_export_time() {
        let mut doc = GraphDocument::export(&sample());
        let hash = doc.content_hash();
        doc.exported_at = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        assert_eq!(doc.content_hash(), hash);
    }

    #[test]
    fn test_rejects_bad_version_and_positions() {
        let mut doc = GraphDocument::export(&sample());
        doc.version = "2.0".into();
        assert!(matches!(doc.validate(), Err(GraphError::Document(_))));

        let mut doc = GraphDocument::export(&sample());
        doc.articles[0].authors.push(9);
        assert!(matches!(
            doc.restore(MergeConfig::default()),
            Err(GraphError::Document(_))
        ));

        assert!(matches!(GraphDocument::from_json("{"), Err(GraphError::Document(_))));
    }

    #[test]
    fn test_restore_keeps_duplicates() {
        let mut doc = GraphDocument::export(&sample());
        let copy = doc.articles[1].clone();
        doc.articles.push(copy);

        let mut restored = doc.restore(MergeConfig::default()).unwrap();
        assert_eq!(restored.store().count(EntityKind::Article), 3);

        let err = restored
            .submit_article(&ArticleCandidate::new("A").with_doi("10.1/a"))
            .unwrap_err();
        assert!(matches!(err, GraphError::ConflictingIdentity { .. }));
    }
}
