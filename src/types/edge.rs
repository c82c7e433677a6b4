//! Relationship kinds and edges of the bibliographic graph.

use serde::{Deserialize, Serialize};
use super::handle::{EntityKind, Handle};

/// Kind of relationship between two entities.
///
/// Every relationship is stored from the article side; the inverse
/// direction (cited-by, authored, publishes, tags) is derived by the
/// relationship index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Article cites article. Inverse: cited-by.
    Cites,
    /// Article is authored by author (ordered). Inverse: authored.
    AuthoredBy,
    /// Article is published in periodical (at most one). Inverse: publishes.
    PublishedIn,
    /// Article is tagged with keyword. Inverse: tags.
    TaggedWith,
}

impl RelationKind {
    /// All relationship kinds in canonical order.
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Cites,
        RelationKind::AuthoredBy,
        RelationKind::PublishedIn,
        RelationKind::TaggedWith,
    ];

    /// Entity kind on the `from` side.
    pub fn source_kind(&self) -> EntityKind {
        EntityKind::Article
    }

    /// Entity kind on the `to` side.
    pub fn target_kind(&self) -> EntityKind {
        match self {
            Self::Cites => EntityKind::Article,
            Self::AuthoredBy => EntityKind::Author,
            Self::PublishedIn => EntityKind::Periodical,
            Self::TaggedWith => EntityKind::Keyword,
        }
    }

    /// Whether a source may have at most one target of this kind.
    pub fn is_single_valued(&self) -> bool {
        matches!(self, Self::PublishedIn)
    }

    /// Parse relation kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cites" => Some(Self::Cites),
            "authored_by" => Some(Self::AuthoredBy),
            "published_in" => Some(Self::PublishedIn),
            "tagged_with" => Some(Self::TaggedWith),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cites => write!(f, "cites"),
            Self::AuthoredBy => write!(f, "authored_by"),
            Self::PublishedIn => write!(f, "published_in"),
            Self::TaggedWith => write!(f, "tagged_with"),
        }
    }
}

/// Directed relationship edge.
///
/// Implements `Ord` for deterministic ordering: (kind, from, to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Relationship kind.
    pub kind: RelationKind,
    /// Source entity (always an article).
    pub from: Handle,
    /// Target entity.
    pub to: Handle,
}

impl Edge {
    /// Create a new edge.
    pub fn new(kind: RelationKind, from: Handle, to: Handle) -> Self {
        Self { kind, from, to }
    }

    /// Create a citation edge.
    pub fn cites(from: Handle, to: Handle) -> Self {
        Self::new(RelationKind::Cites, from, to)
    }

    /// Whether the edge touches the given handle on either side.
    pub fn touches(&self, handle: Handle) -> bool {
        self.from == handle || self.to == handle
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.from.cmp(&other.from))
            .then_with(|| self.to.cmp(&other.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_ordering() {
        let a = Handle::from_raw(1);
        let b = Handle::from_raw(2);
        let c = Handle::from_raw(3);

        let e1 = Edge::cites(a, b);
        let e2 = Edge::cites(a, c);
        let e3 = Edge::cites(b, c);
        let e4 = Edge::new(RelationKind::AuthoredBy, a, b);

        assert!(e1 < e2);
        assert!(e2 < e3);
        // Kind sorts first
        assert!(e3 < e4);
    }

    #[test]
    fn test_target_kinds() {
        assert_eq!(RelationKind::Cites.target_kind(), EntityKind::Article);
        assert_eq!(RelationKind::PublishedIn.target_kind(), EntityKind::Periodical);
        assert!(RelationKind::PublishedIn.is_single_valued());
        assert!(!RelationKind::TaggedWith.is_single_valued());
    }
}
