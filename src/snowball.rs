//! Snowball Expansion Engine.
//!
//! Grows the graph generation by generation from a frontier of articles.
//!
//! ## States
//!
//! ```text
//! Idle ──expand_generation──▶ Expanding(N) ──done──▶ Idle
//! ```
//!
//! ## Neighbours
//!
//! For each frontier article the neighbours are the citation edges already
//! in the index plus the records returned by a [`CitationSource`]:
//!
//! - [`Direction::Citing`]: what the article cites (its reference list)
//! - [`Direction::CitedBy`]: the articles citing it
//! - [`Direction::Both`]: union of the two
//!
//! Every sourced record is submitted to the merge engine and the citation
//! between it and the frontier article is linked. Neighbours not yet in the
//! visited set form the next frontier. The visited set is seeded with the
//! initial frontier and only grows, so expansion terminates on cyclic
//! citation graphs and never proposes an article twice.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphState;
use crate::normalize::{normalize_doi, title_year_key};
use crate::types::{Article, ArticleCandidate, EntityKind, Handle, RelationKind};

/// Which citation direction to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Backward snowballing: follow the articles the frontier cites.
    Citing,
    /// Forward snowballing: follow the articles citing the frontier.
    CitedBy,
    /// Both directions.
    Both,
}

impl Direction {
    /// Parse direction from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "citing" | "backward" | "references" => Some(Self::Citing),
            "cited_by" | "cited-by" | "forward" | "citations" => Some(Self::CitedBy),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether reference lists are followed.
    pub fn follows_references(&self) -> bool {
        matches!(self, Self::Citing | Self::Both)
    }

    /// Whether citing articles are followed.
    pub fn follows_citations(&self) -> bool {
        matches!(self, Self::CitedBy | Self::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Citing => write!(f, "citing"),
            Self::CitedBy => write!(f, "cited_by"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Supplier of already-materialized neighbour records.
///
/// Implementations must not block on I/O; fetching metadata is the job of
/// an outer layer that fills a source before expansion starts.
pub trait CitationSource: Send + Sync {
    /// Records of the articles `article` cites.
    fn references(&self, article: &Article) -> Vec<ArticleCandidate>;

    /// Records of the articles citing `article`.
    fn citations(&self, article: &Article) -> Vec<ArticleCandidate>;
}

/// Citation source that knows nothing; expansion follows index edges only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOnly;

impl CitationSource for IndexOnly {
    fn references(&self, _article: &Article) -> Vec<ArticleCandidate> {
        Vec::new()
    }

    fn citations(&self, _article: &Article) -> Vec<ArticleCandidate> {
        Vec::new()
    }
}

fn source_key(doi: Option<&str>, title: &str, year: Option<i32>) -> Option<String> {
    match doi.and_then(normalize_doi) {
        Some(doi) => Some(format!("doi:{}", doi)),
        None => title_year_key(title, year).map(|k| format!("title:{}", k)),
    }
}

/// In-memory citation source keyed by DOI (or title and year when the
/// subject has no DOI).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCitationSource {
    references: HashMap<String, Vec<ArticleCandidate>>,
    citations: HashMap<String, Vec<ArticleCandidate>>,
}

impl InMemoryCitationSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reference list of `subject`.
    ///
    /// Returns `false` (and stores nothing) if the subject has neither a
    /// DOI nor a title.
    pub fn add_references(&mut self, subject: &ArticleCandidate, records: Vec<ArticleCandidate>) -> bool {
        match source_key(subject.doi.as_deref(), &subject.title, subject.year) {
            Some(key) => {
                self.references.entry(key).or_default().extend(records);
                true
            }
            None => false,
        }
    }

    /// Register the articles citing `subject`.
    pub fn add_citations(&mut self, subject: &ArticleCandidate, records: Vec<ArticleCandidate>) -> bool {
        match source_key(subject.doi.as_deref(), &subject.title, subject.year) {
            Some(key) => {
                self.citations.entry(key).or_default().extend(records);
                true
            }
            None => false,
        }
    }

    /// Builder form of [`add_references`](Self::add_references).
    pub fn with_references(mut self, subject: &ArticleCandidate, records: Vec<ArticleCandidate>) -> Self {
        self.add_references(subject, records);
        self
    }

    /// Builder form of [`add_citations`](Self::add_citations).
    pub fn with_citations(mut self, subject: &ArticleCandidate, records: Vec<ArticleCandidate>) -> Self {
        self.add_citations(subject, records);
        self
    }

    fn lookup(map: &HashMap<String, Vec<ArticleCandidate>>, article: &Article) -> Vec<ArticleCandidate> {
        // A DOI-keyed entry wins; fall back to title and year.
        let by_doi = article
            .doi
            .as_deref()
            .and_then(normalize_doi)
            .and_then(|doi| map.get(&format!("doi:{}", doi)));
        let by_title = || {
            title_year_key(&article.title, article.year)
                .and_then(|k| map.get(&format!("title:{}", k)))
        };
        by_doi.or_else(by_title).cloned().unwrap_or_default()
    }
}

impl CitationSource for InMemoryCitationSource {
    fn references(&self, article: &Article) -> Vec<ArticleCandidate> {
        Self::lookup(&self.references, article)
    }

    fn citations(&self, article: &Article) -> Vec<ArticleCandidate> {
        Self::lookup(&self.citations, article)
    }
}

/// Expansion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExpansionState {
    /// No generation in progress.
    Idle,
    /// Generation `generation` (1-based) in progress.
    Expanding {
        /// Generation number.
        generation: u32,
    },
}

/// Per-record failure during expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionError {
    /// Frontier article being expanded.
    pub origin: Handle,
    /// Description of the failed neighbour record.
    pub candidate: String,
    /// The error.
    pub error: GraphError,
}

/// Outcome of one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Generation number (1-based).
    pub generation: u32,
    /// Newly visited articles, in discovery order.
    pub new_frontier: Vec<Handle>,
    /// Per-record failures.
    pub errors: Vec<ExpansionError>,
}

/// Outcome of a multi-generation expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionReport {
    /// Frontier after the last generation run.
    pub new_frontier: Vec<Handle>,
    /// Every article first visited during the expansion, in discovery order.
    pub discovered: Vec<Handle>,
    /// Per-record failures of all generations.
    pub errors: Vec<ExpansionError>,
    /// Number of generations run.
    pub generations: u32,
}

/// Snowball expansion engine.
///
/// Holds the visited set between generations and between runs. One engine
/// drives one expansion session; start a new engine to forget what was
/// visited.
#[derive(Debug, Clone)]
pub struct SnowballEngine {
    state: ExpansionState,
    generation: u32,
    visited: BTreeSet<Handle>,
}

impl SnowballEngine {
    /// Create an engine whose visited set is seeded with `frontier`.
    pub fn new(frontier: &[Handle]) -> Self {
        Self {
            state: ExpansionState::Idle,
            generation: 0,
            visited: frontier.iter().copied().collect(),
        }
    }

    /// Add frontier handles to the visited set.
    pub fn seed(&mut self, frontier: &[Handle]) {
        self.visited.extend(frontier.iter().copied());
    }

    /// Current state.
    pub fn state(&self) -> ExpansionState {
        self.state
    }

    /// Number of generations completed.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether a handle has been visited.
    pub fn is_visited(&self, handle: Handle) -> bool {
        self.visited.contains(&handle)
    }

    /// Number of visited handles.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Expand one generation.
    ///
    /// Per-record failures are collected in the report; only an internal
    /// consistency error aborts the generation.
    pub fn expand_generation(
        &mut self,
        graph: &mut GraphState,
        frontier: &[Handle],
        direction: Direction,
        source: &dyn CitationSource,
    ) -> GraphResult<GenerationReport> {
        let generation = self.generation + 1;
        self.state = ExpansionState::Expanding { generation };
        let result = self.run_generation(graph, frontier, direction, source, generation);
        self.state = ExpansionState::Idle;
        let report = result?;
        self.generation = generation;

        info!(
            generation,
            direction = %direction,
            frontier = frontier.len(),
            discovered = report.new_frontier.len(),
            errors = report.errors.len(),
            "Snowball generation complete"
        );
        Ok(report)
    }

    fn run_generation(
        &mut self,
        graph: &mut GraphState,
        frontier: &[Handle],
        direction: Direction,
        source: &dyn CitationSource,
        generation: u32,
    ) -> GraphResult<GenerationReport> {
        let mut report = GenerationReport {
            generation,
            ..Default::default()
        };

        for &origin in frontier {
            let article = match graph.store().article(origin) {
                Ok(article) => article.clone(),
                Err(error) => {
                    warn!(origin = %origin, error = %error, "Frontier entry skipped");
                    report.errors.push(ExpansionError {
                        origin,
                        candidate: origin.to_string(),
                        error,
                    });
                    continue;
                }
            };

            if direction.follows_references() {
                for existing in graph.index().targets(RelationKind::Cites, origin) {
                    self.visit(existing, &mut report);
                }
                for record in source.references(&article) {
                    let linked = graph
                        .submit_article(&record)
                        .and_then(|h| graph.link(RelationKind::Cites, origin, h).map(|_| h));
                    self.absorb(origin, &record, linked, &mut report)?;
                }
            }

            if direction.follows_citations() {
                for existing in graph.index().sources(RelationKind::Cites, origin) {
                    self.visit(existing, &mut report);
                }
                for record in source.citations(&article) {
                    let linked = graph
                        .submit_article(&record)
                        .and_then(|h| graph.link(RelationKind::Cites, h, origin).map(|_| h));
                    self.absorb(origin, &record, linked, &mut report)?;
                }
            }
        }
        Ok(report)
    }

    fn visit(&mut self, handle: Handle, report: &mut GenerationReport) {
        if self.visited.insert(handle) {
            report.new_frontier.push(handle);
        }
    }

    fn absorb(
        &mut self,
        origin: Handle,
        record: &ArticleCandidate,
        linked: GraphResult<Handle>,
        report: &mut GenerationReport,
    ) -> GraphResult<()> {
        match linked {
            Ok(handle) => {
                debug!(origin = %origin, neighbour = %handle, "Neighbour merged");
                self.visit(handle, report);
                Ok(())
            }
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                warn!(
                    origin = %origin,
                    candidate = %record.describe(),
                    error = %error,
                    "Neighbour record rejected"
                );
                report.errors.push(ExpansionError {
                    origin,
                    candidate: record.describe(),
                    error,
                });
                Ok(())
            }
        }
    }

    /// Expand up to `generation_limit` generations, taking the write lock
    /// once per generation.
    ///
    /// Stops early when a generation discovers nothing. With a limit of
    /// zero the frontier is returned unchanged.
    pub fn run(
        &mut self,
        graph: &RwLock<GraphState>,
        frontier: &[Handle],
        direction: Direction,
        generation_limit: u32,
        source: &dyn CitationSource,
    ) -> GraphResult<ExpansionReport> {
        let mut report = ExpansionReport {
            new_frontier: frontier.to_vec(),
            ..Default::default()
        };

        for _ in 0..generation_limit {
            let step = {
                let mut state = graph.write();
                self.expand_generation(&mut state, &report.new_frontier, direction, source)?
            };
            report.generations += 1;
            report.discovered.extend_from_slice(&step.new_frontier);
            report.errors.extend(step.errors);
            report.new_frontier = step.new_frontier;
            if report.new_frontier.is_empty() {
                break;
            }
        }
        Ok(report)
    }
}

impl Default for SnowballEngine {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Check that every frontier handle is a live article.
pub fn validate_frontier(graph: &GraphState, frontier: &[Handle]) -> GraphResult<()> {
    for &h in frontier {
        graph.store().expect_kind(h, EntityKind::Article)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeConfig;

    fn rec(title: &str, doi: &str) -> ArticleCandidate {
        ArticleCandidate::new(title).with_doi(doi)
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::from_str("cited-by"), Some(Direction::CitedBy));
        assert_eq!(Direction::from_str("BACKWARD"), Some(Direction::Citing));
        assert_eq!(Direction::from_str("sideways"), None);
        assert!(Direction::Both.follows_references() && Direction::Both.follows_citations());
    }

    #[test]
    fn test_cited_by_generation() {
        let mut graph = GraphState::new(MergeConfig::default());
        let a = graph.submit_article(&rec("A", "10.1/a")).unwrap();
        let source = InMemoryCitationSource::new()
            .with_citations(&rec("A", "10.1/a"), vec![rec("B", "10.1/b"), rec("C", "10.1/c")]);

        let mut engine = SnowballEngine::new(&[a]);
        let report = engine
            .expand_generation(&mut graph, &[a], Direction::CitedBy, &source)
            .unwrap();

        assert_eq!(report.new_frontier.len(), 2);
        for h in &report.new_frontier {
            assert_eq!(graph.cites(*h).unwrap(), vec![a]);
        }
        assert_eq!(engine.state(), ExpansionState::Idle);
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_citing_follows_index_edges() {
        let mut graph = GraphState::new(MergeConfig::default());
        let b = graph
            .submit_article(&rec("B", "10.1/b").citing(rec("A", "10.1/a")))
            .unwrap();
        let a = graph.match_article(&rec("", "10.1/a")).unwrap().unwrap();

        let mut engine = SnowballEngine::new(&[b]);
        let report = engine
            .expand_generation(&mut graph, &[b], Direction::Citing, &IndexOnly)
            .unwrap();
        assert_eq!(report.new_frontier, vec![a]);

        // Going forward from b finds nothing
        let report = engine
            .expand_generation(&mut graph, &[b], Direction::CitedBy, &IndexOnly)
            .unwrap();
        assert!(report.new_frontier.is_empty());
    }

    #[test]
    fn test_visited_articles_are_not_reproposed() {
        let mut graph = GraphState::new(MergeConfig::default());
        let a = graph.submit_article(&rec("A", "10.1/a")).unwrap();
        // a <-> b mutual citation
        let source = InMemoryCitationSource::new()
            .with_references(&rec("A", "10.1/a"), vec![rec("B", "10.1/b")])
            .with_references(&rec("B", "10.1/b"), vec![rec("A", "10.1/a")]);

        let mut engine = SnowballEngine::new(&[a]);
        let first = engine
            .expand_generation(&mut graph, &[a], Direction::Citing, &source)
            .unwrap();
        let second = engine
            .expand_generation(&mut graph, &first.new_frontier, Direction::Citing, &source)
            .unwrap();

        assert_eq!(first.new_frontier.len(), 1);
        assert!(second.new_frontier.is_empty());
        // The back edge is still recorded
        let b = first.new_frontier[0];
        assert_eq!(graph.cites(b).unwrap(), vec![a]);
    }

    #[test]
    fn test_runs_share_visited_set() {
        let graph = RwLock::new(GraphState::new(MergeConfig::default()));
        let b = graph
            .write()
            .submit_article(&rec("B", "10.1/b").citing(rec("A", "10.1/a")))
            .unwrap();

        let mut engine = SnowballEngine::default();
        engine.seed(&[b]);
        let first = engine.run(&graph, &[b], Direction::Both, 1, &IndexOnly).unwrap();
        assert_eq!(first.new_frontier.len(), 1);

        engine.seed(&first.new_frontier);
        let second = engine
            .run(&graph, &first.new_frontier, Direction::Both, 1, &IndexOnly)
            .unwrap();
        assert!(second.new_frontier.is_empty());
        assert_eq!(engine.visited_count(), 2);
    }

    #[test]
    fn test_bad_frontier_entry_is_reported() {
        let mut graph = GraphState::new(MergeConfig::default());
        let missing = Handle::from_raw(77);

        let mut engine = SnowballEngine::new(&[missing]);
        let report = engine
            .expand_generation(&mut graph, &[missing], Direction::Both, &IndexOnly)
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].error, GraphError::NotFound(missing));
        assert!(validate_frontier(&graph, &[missing]).is_err());
    }

    #[test]
    fn test_run_stops_when_exhausted() {
        let graph = RwLock::new(GraphState::new(MergeConfig::default()));
        let a = graph.write().submit_article(&rec("A", "10.1/a")).unwrap();
        let source = InMemoryCitationSource::new()
            .with_references(&rec("A", "10.1/a"), vec![rec("B", "10.1/b")]);

        let mut engine = SnowballEngine::new(&[a]);
        let report = engine
            .run(&graph, &[a], Direction::Citing, 10, &source)
            .unwrap();

        assert_eq!(report.generations, 2);
        assert!(report.new_frontier.is_empty());
        assert_eq!(report.discovered.len(), 1);

        let mut engine = SnowballEngine::new(&[a]);
        let unchanged = engine.run(&graph, &[a], Direction::Citing, 0, &source).unwrap();
        assert_eq!(unchanged.new_frontier, vec![a]);
        assert_eq!(unchanged.generations, 0);
    }
}
