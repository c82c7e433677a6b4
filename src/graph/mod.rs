//! Thread-safe bibliographic graph.
//!
//! [`SnowballGraph`] owns one [`GraphState`] behind a single `RwLock`.
//! Mutations (submission, merge, expansion, removal) take the write lock;
//! queries and snapshots take the read lock. Layout is computed on a
//! snapshot after the lock is released, so a long layout never blocks
//! writers.
//!
//! The graph also owns the expansion session: the visited set survives
//! across [`SnowballGraph::expand`] calls until
//! [`SnowballGraph::reset_expansion`], so driving expansion one generation
//! at a time still proposes every article at most once.

pub mod state;

pub use state::GraphState;

use parking_lot::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::config::GraphConfig;
use crate::document::GraphDocument;
use crate::error::GraphResult;
use crate::layout::{self, CancellationToken, Layout, LayoutConfig, LayoutError};
use crate::merge::{find_near_duplicates, BatchReport, MergeReport, NearDuplicate};
use crate::snapshot::GraphSnapshot;
use crate::snowball::{validate_frontier, CitationSource, Direction, ExpansionReport, SnowballEngine};
use crate::types::{Article, Candidate, Entity, EntityKind, Handle, RelationKind};

/// A bibliographic graph shared between threads.
#[derive(Debug, Default)]
pub struct SnowballGraph {
    state: RwLock<GraphState>,
    expansion: Mutex<SnowballEngine>,
    config: GraphConfig,
}

impl SnowballGraph {
    /// Create an empty graph with default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            state: RwLock::new(GraphState::new(config.merge.clone())),
            expansion: Mutex::new(SnowballEngine::default()),
            config,
        }
    }

    /// Wrap an existing state (e.g. one restored from a document).
    pub fn from_state(state: GraphState, config: GraphConfig) -> Self {
        Self {
            state: RwLock::new(state),
            expansion: Mutex::new(SnowballEngine::default()),
            config,
        }
    }

    /// Configuration this graph was built with.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Run a closure against the state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.state.read())
    }

    /// Consume the graph and return its state.
    pub fn into_state(self) -> GraphState {
        self.state.into_inner()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Merge one candidate into the graph.
    pub fn submit(&self, candidate: &Candidate) -> GraphResult<Handle> {
        self.state.write().submit(candidate)
    }

    /// Merge a batch of candidates under one write lock.
    pub fn submit_all(&self, candidates: &[Candidate]) -> GraphResult<BatchReport> {
        self.state.write().submit_all(candidates)
    }

    /// Replace the record of an entity.
    pub fn update(&self, handle: Handle, entity: impl Into<Entity>) -> GraphResult<Entity> {
        self.state.write().update(handle, entity)
    }

    /// Add a relationship.
    pub fn link(&self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        self.state.write().link(kind, from, to)
    }

    /// Remove a relationship.
    pub fn unlink(&self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        self.state.write().unlink(kind, from, to)
    }

    /// Remove an entity and every relationship touching it.
    pub fn remove(&self, handle: Handle) -> GraphResult<Entity> {
        self.state.write().remove(handle)
    }

    /// Merge `loser` into `winner`.
    pub fn merge_entities(&self, winner: Handle, loser: Handle) -> GraphResult<MergeReport> {
        self.state.write().merge_entities(winner, loser)
    }

    /// Snowball expansion from `frontier`.
    ///
    /// Every frontier handle must be a live article. Frontier handles join
    /// the session's visited set, and articles visited by earlier calls are
    /// never proposed again. The write lock is held for one generation at a
    /// time; concurrent expansions are serialized.
    #[instrument(skip(self, frontier, source), fields(frontier = frontier.len()))]
    pub fn expand(
        &self,
        frontier: &[Handle],
        direction: Direction,
        generation_limit: u32,
        source: &dyn CitationSource,
    ) -> GraphResult<ExpansionReport> {
        self.read(|state| validate_frontier(state, frontier))?;
        let mut engine = self.expansion.lock();
        engine.seed(frontier);
        let report = engine.run(&self.state, frontier, direction, generation_limit, source)?;
        info!(
            generations = report.generations,
            discovered = report.discovered.len(),
            errors = report.errors.len(),
            visited = engine.visited_count(),
            "Snowball expansion complete"
        );
        Ok(report)
    }

    /// Forget every visited article and start a new expansion session.
    pub fn reset_expansion(&self) {
        *self.expansion.lock() = SnowballEngine::default();
        info!("Snowball expansion session reset");
    }

    /// Number of articles visited in the current expansion session.
    pub fn visited_count(&self) -> usize {
        self.expansion.lock().visited_count()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Copy of a live entity.
    pub fn get(&self, handle: Handle) -> GraphResult<Entity> {
        self.read(|s| s.store().get(handle).cloned())
    }

    /// Copy of a live article.
    pub fn article(&self, handle: Handle) -> GraphResult<Article> {
        self.read(|s| s.store().article(handle).cloned())
    }

    /// Kind of a live entity.
    pub fn kind_of(&self, handle: Handle) -> GraphResult<EntityKind> {
        self.read(|s| s.store().kind_of(handle))
    }

    /// Number of live entities of a kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.read(|s| s.store().count(kind))
    }

    /// Articles cited by `article`.
    pub fn cites(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.cites(article))
    }

    /// Articles citing `article`.
    pub fn cited_by(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.cited_by(article))
    }

    /// Authors of `article` in credited order.
    pub fn authors_of(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.authors_of(article))
    }

    /// Articles written by `author`.
    pub fn articles_by(&self, author: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.articles_by(author))
    }

    /// Periodical `article` appeared in.
    pub fn periodical_of(&self, article: Handle) -> GraphResult<Option<Handle>> {
        self.read(|s| s.periodical_of(article))
    }

    /// Articles published in `periodical`.
    pub fn articles_in(&self, periodical: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.articles_in(periodical))
    }

    /// Keywords of `article`.
    pub fn keywords_of(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.keywords_of(article))
    }

    /// Articles tagged with `keyword`.
    pub fn articles_tagged(&self, keyword: Handle) -> GraphResult<Vec<Handle>> {
        self.read(|s| s.articles_tagged(keyword))
    }

    /// Articles flagged as part of the start set.
    pub fn start_set(&self) -> Vec<Handle> {
        self.read(|s| s.start_set())
    }

    /// Citation hops from `from` to the nearest of `targets`.
    pub fn citation_distance(&self, from: Handle, targets: &[Handle]) -> GraphResult<Option<usize>> {
        self.read(|s| s.citation_distance(from, targets))
    }

    /// Near-duplicate pairs of `kind` within the configured edit distance.
    pub fn find_near_duplicates(&self, kind: EntityKind) -> Vec<NearDuplicate> {
        let distance = self.config.merge.near_duplicate_distance;
        self.read(|s| find_near_duplicates(s, kind, distance))
    }

    /// Check every structural invariant.
    pub fn check_invariants(&self) -> GraphResult<()> {
        self.read(|s| s.check_invariants())
    }

    // ------------------------------------------------------------------
    // Snapshots, layout and documents
    // ------------------------------------------------------------------

    /// Copy the graph under the read lock.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.read(GraphSnapshot::capture)
    }

    /// Lay out a fresh snapshot with the given parameters.
    pub fn compute_layout(&self, config: &LayoutConfig) -> Result<Layout, LayoutError> {
        self.compute_layout_with_cancel(config, &CancellationToken::new())
    }

    /// Lay out a fresh snapshot, checking `cancel` between iterations.
    pub fn compute_layout_with_cancel(
        &self,
        config: &LayoutConfig,
        cancel: &CancellationToken,
    ) -> Result<Layout, LayoutError> {
        let snapshot = self.snapshot();
        layout::compute_layout(&snapshot, config, cancel)
    }

    /// Lay out a fresh snapshot with the configured parameters.
    pub fn default_layout(&self) -> Result<Layout, LayoutError> {
        self.compute_layout(&self.config.layout)
    }

    /// Export the graph as a document.
    pub fn to_document(&self) -> GraphDocument {
        self.read(GraphDocument::export)
    }

    /// Restore a graph from a document.
    pub fn from_document(document: &GraphDocument, config: GraphConfig) -> GraphResult<Self> {
        let state = document.restore(config.merge.clone())?;
        Ok(Self::from_state(state, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::snowball::InMemoryCitationSource;
    use crate::types::{ArticleCandidate, AuthorCandidate};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_submit_and_query() {
        let graph = SnowballGraph::new();
        let b = graph
            .submit(
                &ArticleCandidate::new("B")
                    .with_doi("10.1/b")
                    .with_author(AuthorCandidate::new("Jane Doe"))
                    .citing(ArticleCandidate::new("A").with_doi("10.1/a"))
                    .into(),
            )
            .unwrap();

        let cited = graph.cites(b).unwrap();
        assert_eq!(cited.len(), 1);
        assert_eq!(graph.cited_by(cited[0]).unwrap(), vec![b]);
        assert_eq!(graph.authors_of(b).unwrap().len(), 1);
        assert_eq!(graph.count(EntityKind::Article), 2);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_expand_rejects_non_article_frontier() {
        let graph = SnowballGraph::new();
        let author = graph.submit(&AuthorCandidate::new("Jane Doe").into()).unwrap();
        let err = graph
            .expand(&[author], Direction::Both, 1, &InMemoryCitationSource::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::KindMismatch { .. }));
    }

    #[test]
    fn test_expand_discovers_neighbours() {
        let graph = SnowballGraph::new();
        let a = ArticleCandidate::new("A").with_doi("10.1/a");
        let seed = graph.submit(&a.clone().into()).unwrap();
        let source = InMemoryCitationSource::new().with_citations(
            &a,
            vec![
                ArticleCandidate::new("B").with_doi("10.1/b"),
                ArticleCandidate::new("C").with_doi("10.1/c"),
            ],
        );

        let report = graph.expand(&[seed], Direction::CitedBy, 1, &source).unwrap();
        assert_eq!(report.new_frontier.len(), 2);
        assert_eq!(graph.cited_by(seed).unwrap(), report.new_frontier);
    }

    #[test]
    fn test_layout_runs_on_snapshot() {
        let graph = SnowballGraph::new();
        graph.submit(&ArticleCandidate::new("Only").into()).unwrap();
        let layout = graph.default_layout().unwrap();
        assert_eq!(layout.positions.len(), 1);
        assert_eq!(layout.snapshot_id, graph.snapshot().snapshot_id);
    }

    #[test]
    fn test_document_round_trip_through_facade() {
        let graph = SnowballGraph::new();
        graph
            .submit(
                &ArticleCandidate::new("B")
                    .citing(ArticleCandidate::new("A"))
                    .into(),
            )
            .unwrap();
        let doc = graph.to_document();
        let restored = SnowballGraph::from_document(&doc, GraphConfig::default()).unwrap();
        assert_eq!(restored.to_document().content_hash(), doc.content_hash());
    }

    #[test]
    fn test_concurrent_submissions_converge() {
        let graph = Arc::new(SnowballGraph::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let graph = Arc::clone(&graph);
                thread::spawn(move || {
                    graph
                        .submit(&ArticleCandidate::new("Shared").with_doi("10.1/shared").into())
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<Handle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(graph.count(EntityKind::Article), 1);
    }
}
