//! Entity records held by the store.
//!
//! Records only carry scalar fields. Relationships between entities live in
//! the [`RelationIndex`](crate::index::RelationIndex) as handle-to-handle
//! mappings, never as embedded references.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::handle::EntityKind;

/// Screening decision for an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Kept in the review.
    Included,
    /// Screened out.
    Excluded,
    /// Not yet screened.
    Undecided,
}

impl ArticleStatus {
    /// Parse status from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "included" => Some(Self::Included),
            "excluded" => Some(Self::Excluded),
            "undecided" | "" => Some(Self::Undecided),
            _ => None,
        }
    }
}

impl Default for ArticleStatus {
    fn default() -> Self {
        Self::Undecided
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included => write!(f, "included"),
            Self::Excluded => write!(f, "excluded"),
            Self::Undecided => write!(f, "undecided"),
        }
    }
}

/// A publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    /// Title as imported.
    pub title: String,
    /// Publication year.
    pub year: Option<i32>,
    /// Publication month (1-12).
    pub month: Option<u8>,
    /// DOI or other persistent identifier. Strong match key when present.
    pub doi: Option<String>,
    /// Abstract text.
    pub abstract_text: String,
    /// Volume.
    pub volume: String,
    /// Issue.
    pub issue: String,
    /// Page range.
    pub pages: String,
    /// Screening decision.
    pub status: ArticleStatus,
    /// Whether this article belongs to the seed set of the review.
    pub start_set: bool,
    /// Free-form notes. Merge conflicts are appended here.
    pub notes: String,
}

impl Article {
    /// Create an article with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A person credited on one or more articles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    /// Full display name.
    pub name: String,
    /// Organisation the author was affiliated with.
    pub affiliation: Option<String>,
    /// ORCID or similar identifier.
    pub orcid: Option<String>,
    /// Free-form notes.
    pub notes: String,
}

impl Author {
    /// Create an author with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A journal, proceedings series or preprint server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Periodical {
    /// Periodical name.
    pub name: String,
    /// ISSN.
    pub issn: Option<String>,
    /// Free-form notes.
    pub notes: String,
}

impl Periodical {
    /// Create a periodical with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A keyword or user tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keyword {
    /// Label text.
    pub label: String,
    /// Free-form notes.
    pub notes: String,
}

impl Keyword {
    /// Create a keyword with a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// Any entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    /// Article record.
    Article(Article),
    /// Author record.
    Author(Author),
    /// Periodical record.
    Periodical(Periodical),
    /// Keyword record.
    Keyword(Keyword),
}

impl Entity {
    /// Kind of this entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Article(_) => EntityKind::Article,
            Self::Author(_) => EntityKind::Author,
            Self::Periodical(_) => EntityKind::Periodical,
            Self::Keyword(_) => EntityKind::Keyword,
        }
    }

    /// Human-readable label (title, name or keyword label).
    pub fn label(&self) -> &str {
        match self {
            Self::Article(a) => &a.title,
            Self::Author(a) => &a.name,
            Self::Periodical(p) => &p.name,
            Self::Keyword(k) => &k.label,
        }
    }

    /// Notes field of the entity.
    pub fn notes(&self) -> &str {
        match self {
            Self::Article(a) => &a.notes,
            Self::Author(a) => &a.notes,
            Self::Periodical(p) => &p.notes,
            Self::Keyword(k) => &k.notes,
        }
    }

    /// Mutable notes field of the entity.
    pub fn notes_mut(&mut self) -> &mut String {
        match self {
            Self::Article(a) => &mut a.notes,
            Self::Author(a) => &mut a.notes,
            Self::Periodical(p) => &mut p.notes,
            Self::Keyword(k) => &mut k.notes,
        }
    }

    /// Borrow as article.
    pub fn as_article(&self) -> Option<&Article> {
        match self {
            Self::Article(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as author.
    pub fn as_author(&self) -> Option<&Author> {
        match self {
            Self::Author(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as periodical.
    pub fn as_periodical(&self) -> Option<&Periodical> {
        match self {
            Self::Periodical(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow as keyword.
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Self::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

impl From<Article> for Entity {
    fn from(a: Article) -> Self {
        Self::Article(a)
    }
}

impl From<Author> for Entity {
    fn from(a: Author) -> Self {
        Self::Author(a)
    }
}

impl From<Periodical> for Entity {
    fn from(p: Periodical) -> Self {
        Self::Periodical(p)
    }
}

impl From<Keyword> for Entity {
    fn from(k: Keyword) -> Self {
        Self::Keyword(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_and_label() {
        let e: Entity = Author::new("Jane Doe").into();
        assert_eq!(e.kind(), EntityKind::Author);
        assert_eq!(e.label(), "Jane Doe");
    }

    #[test]
    fn test_status_default_is_undecided() {
        assert_eq!(Article::new("x").status, ArticleStatus::Undecided);
        assert_eq!(ArticleStatus::from_str("INCLUDED"), Some(ArticleStatus::Included));
    }

    #[test]
    fn test_entity_serde_is_tagged() {
        let e: Entity = Keyword::new("graphs").into();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "keyword");
        assert_eq!(json["label"], "graphs");
    }
}
