//! # snowball-graph
//!
//! Bibliographic entity graph for literature reviews built by citation
//! snowballing.
//!
//! The graph holds four entity kinds (articles, authors, periodicals and
//! keywords) linked by citations, authorship, publication venue and
//! keyword tags. It answers one question:
//!
//! > Starting from a handful of papers, which papers are one, two, ...
//! > citation hops away, and how do they relate?
//!
//! ## Core Contract
//!
//! 1. Records from any source are merged on stable keys (DOI, title+year,
//!    normalized names) so that every paper, person and venue exists once
//! 2. Snowball expansion follows citations backward and forward, one
//!    generation at a time, never revisiting an article
//! 3. A deterministic force-directed layout places the graph in 2D;
//!    the same snapshot and parameters always give the same positions
//!
//! ## Architecture
//!
//! ```text
//! Candidate → Merge Engine → GraphState (EntityStore + RelationIndex + KeyIndex)
//!                                 ↓                        ↑
//!                           GraphSnapshot            SnowballEngine ← CitationSource
//!                                 ↓
//!                          compute_layout → Layout (positions + fingerprint)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same graph content → identical `snapshot_id`
//! - Same snapshot + same layout parameters → identical layout fingerprint
//! - Edge ordering is canonical (kind, from, to); entity ordering is
//!   creation order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod store;
pub mod index;
pub mod normalize;
pub mod merge;
pub mod graph;
pub mod snowball;
pub mod layout;
pub mod snapshot;
pub mod document;
pub mod config;
pub mod canonical;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Handle, EntityKind, Entity, Article, Author, Periodical, Keyword, ArticleStatus,
    Edge, RelationKind, Candidate, ArticleCandidate, AuthorCandidate, PeriodicalCandidate,
    KeywordCandidate, ArticleRef,
};
pub use error::{GraphError, GraphResult};
pub use store::EntityStore;
pub use index::{RelationIndex, RewireReport};
pub use merge::{
    AuthorKeyPolicy, BatchReport, MergeConfig, MergeReport, NearDuplicate, RejectedCandidate,
};
pub use graph::{GraphState, SnowballGraph};
pub use snowball::{
    CitationSource, Direction, ExpansionReport, ExpansionState, InMemoryCitationSource, IndexOnly,
    SnowballEngine,
};
pub use layout::{compute_layout, CancellationToken, Layout, LayoutConfig, LayoutError, Point};
pub use snapshot::GraphSnapshot;
pub use document::{GraphDocument, DOCUMENT_VERSION};
pub use config::GraphConfig;
pub use canonical::{canonical_hash, canonical_hash_hex, quantize, to_canonical_bytes};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for snapshot and record types.
/// Increment on breaking changes to any schema type.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Force model identifier embedded in layout parameter hashes.
pub const LAYOUT_MODEL_VERSION: &str = "force_layout_v1";
