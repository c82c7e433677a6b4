//! Core types for the bibliographic graph.

pub mod handle;
pub mod entity;
pub mod edge;
pub mod candidate;

pub use handle::{Handle, EntityKind};
pub use entity::{Entity, Article, Author, Periodical, Keyword, ArticleStatus};
pub use edge::{Edge, RelationKind};
pub use candidate::{
    Candidate, ArticleCandidate, AuthorCandidate, PeriodicalCandidate, KeywordCandidate,
    ArticleRef,
};
