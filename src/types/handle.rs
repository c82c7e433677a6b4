//! Entity handles and kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identity of an entity in the graph.
///
/// Handles are allocated from a monotonically increasing counter and are
/// never reused, so a handle retired by a merge or removal can never
/// resolve to another entity later. Implements `Ord` so that handle order
/// equals creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Wrap a raw handle value (e.g. one received over the service API).
    ///
    /// A raw value that was never allocated simply fails lookups with
    /// `NotFound`.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of bibliographic entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Journal article, conference paper, preprint.
    Article,
    /// Person credited on an article.
    Author,
    /// Journal or proceedings an article appeared in.
    Periodical,
    /// User-defined keyword or tag.
    Keyword,
}

impl EntityKind {
    /// All kinds in canonical order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Article,
        EntityKind::Author,
        EntityKind::Periodical,
        EntityKind::Keyword,
    ];

    /// Parse entity kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "article" => Some(Self::Article),
            "author" => Some(Self::Author),
            "periodical" | "journal" => Some(Self::Periodical),
            "keyword" | "tag" => Some(Self::Keyword),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Article => write!(f, "article"),
            Self::Author => write!(f, "author"),
            Self::Periodical => write!(f, "periodical"),
            Self::Keyword => write!(f, "keyword"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ordering_follows_allocation() {
        assert!(Handle::from_raw(1) < Handle::from_raw(2));
        assert_eq!(Handle::from_raw(7).as_u64(), 7);
    }

    #[test]
    fn test_handle_serializes_as_number() {
        let json = serde_json::to_string(&Handle::from_raw(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(EntityKind::from_str("Journal"), Some(EntityKind::Periodical));
        assert_eq!(EntityKind::from_str("tag"), Some(EntityKind::Keyword));
        assert_eq!(EntityKind::from_str("book"), None);
    }
}
