//! Merge Engine.
//!
//! Matches candidate records against live entities and folds them into the
//! graph without losing data.
//!
//! ## Match keys (first match wins)
//!
//! | Kind       | Primary key            | Fallback key          |
//! |------------|------------------------|-----------------------|
//! | Article    | normalized DOI         | normalized title+year |
//! | Author     | normalized name (+aff) | none                  |
//! | Periodical | normalized name        | ISSN                  |
//! | Keyword    | normalized label       | none                  |
//!
//! ## Procedure
//!
//! 1. Preflight: resolve every key the candidate tree touches. A DOI or
//!    author key claimed by two live entities fails the whole submission
//!    with `ConflictingIdentity` before anything is written.
//! 2. No match: create the entity.
//! 3. Match: fold fields into the winner (see [`fold`]).
//! 4. Link declared relationships (authors in order, periodical, keywords,
//!    citations in both directions), recursing into nested records.
//!
//! Candidates are resolved before anything is materialized, so a submission
//! never leaves a half-merged duplicate behind. Explicit merges of two live
//! entities go through [`GraphState::merge_entities`], which rewires the
//! loser's relationships onto the winner and retires the loser.

pub mod duplicates;
pub mod fold;
pub mod keys;

pub use duplicates::{find_near_duplicates, NearDuplicate};
pub use keys::{AuthorKeyPolicy, KeyIndex, KeyKind};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphState;
use crate::normalize::{non_blank, normalize_doi, normalize_issn, normalize_key, title_year_key};
use crate::types::{
    ArticleCandidate, ArticleRef, AuthorCandidate, Candidate, Edge, Entity, EntityKind, Handle,
    KeywordCandidate, PeriodicalCandidate, RelationKind,
};

use fold::{fold_entity, record_conflict};

/// Merge engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// How authors are keyed for matching.
    pub author_key: AuthorKeyPolicy,
    /// Maximum Levenshtein distance between merge keys reported by
    /// near-duplicate detection.
    pub near_duplicate_distance: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            author_key: AuthorKeyPolicy::Name,
            near_duplicate_distance: 2,
        }
    }
}

/// Outcome of an explicit merge of two live entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Surviving handle.
    pub winner: Handle,
    /// Retired handle.
    pub loser: Handle,
    /// Relationship edges re-pointed to the winner.
    pub moved_edges: usize,
    /// Single-valued edges of the loser that could not be kept.
    pub dropped_edges: Vec<Edge>,
    /// Conflict lines recorded in the winner's notes.
    pub conflicts: Vec<String>,
}

/// A candidate rejected during batch submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCandidate {
    /// Position in the submitted batch.
    pub position: usize,
    /// Description of the candidate (DOI, title or name).
    pub candidate: String,
    /// Why it was rejected.
    pub error: GraphError,
}

/// Outcome of a batch submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Handles of accepted candidates, in batch order, with their position.
    pub accepted: Vec<(usize, Handle)>,
    /// Rejected candidates.
    pub rejected: Vec<RejectedCandidate>,
}

fn unique_hit(
    kind: EntityKind,
    key: String,
    hits: &[Handle],
) -> GraphResult<Option<Handle>> {
    match hits {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        many => Err(GraphError::ConflictingIdentity {
            kind,
            key,
            claimants: many.to_vec(),
        }),
    }
}

impl GraphState {
    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Live article matching a candidate, if any.
    pub fn match_article(&self, candidate: &ArticleCandidate) -> GraphResult<Option<Handle>> {
        if let Some(doi) = candidate.doi.as_deref().and_then(normalize_doi) {
            let hits = self.keys.lookup(KeyKind::Doi, &doi);
            if let Some(found) = unique_hit(EntityKind::Article, doi, hits)? {
                return Ok(Some(found));
            }
        }
        Ok(title_year_key(&candidate.title, candidate.year)
            .and_then(|key| self.keys.lookup(KeyKind::TitleYear, &key).first().copied()))
    }

    /// Live author matching a candidate, if any.
    pub fn match_author(&self, candidate: &AuthorCandidate) -> GraphResult<Option<Handle>> {
        match keys::author_key(
            &candidate.name,
            candidate.affiliation.as_deref(),
            self.keys.policy(),
        ) {
            Some(key) => {
                let hits = self.keys.lookup(KeyKind::AuthorName, &key);
                unique_hit(EntityKind::Author, key, hits)
            }
            None => Ok(None),
        }
    }

    /// Live periodical matching a candidate, if any.
    pub fn match_periodical(&self, candidate: &PeriodicalCandidate) -> Option<Handle> {
        let name = normalize_key(&candidate.name);
        if !name.is_empty() {
            if let Some(found) = self.keys.lookup(KeyKind::PeriodicalName, &name).first() {
                return Some(*found);
            }
        }
        candidate
            .issn
            .as_deref()
            .and_then(normalize_issn)
            .and_then(|issn| self.keys.lookup(KeyKind::PeriodicalIssn, &issn).first().copied())
    }

    /// Live keyword matching a candidate, if any.
    pub fn match_keyword(&self, candidate: &KeywordCandidate) -> Option<Handle> {
        let label = normalize_key(&candidate.label);
        if label.is_empty() {
            return None;
        }
        self.keys.lookup(KeyKind::KeywordLabel, &label).first().copied()
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Merge a candidate into the graph and return the handle of the entity
    /// it became (new or existing).
    pub fn submit(&mut self, candidate: &Candidate) -> GraphResult<Handle> {
        match candidate {
            Candidate::Article(c) => self.submit_article(c),
            Candidate::Author(c) => self.submit_author(c),
            Candidate::Periodical(c) => self.submit_periodical(c),
            Candidate::Keyword(c) => self.submit_keyword(c),
        }
    }

    /// Submit candidates one by one, collecting per-record failures.
    ///
    /// Only an internal consistency error aborts the batch.
    pub fn submit_all(&mut self, candidates: &[Candidate]) -> GraphResult<BatchReport> {
        let mut report = BatchReport::default();
        for (position, candidate) in candidates.iter().enumerate() {
            match self.submit(candidate) {
                Ok(handle) => report.accepted.push((position, handle)),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(
                        position,
                        candidate = %candidate.describe(),
                        error = %error,
                        "Candidate rejected"
                    );
                    report.rejected.push(RejectedCandidate {
                        position,
                        candidate: candidate.describe(),
                        error,
                    });
                }
            }
        }
        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Batch submitted"
        );
        Ok(report)
    }

    /// Merge an article candidate (and the records it declares).
    pub fn submit_article(&mut self, candidate: &ArticleCandidate) -> GraphResult<Handle> {
        self.preflight_article(candidate)?;
        self.apply_article(candidate)
    }

    /// Merge an author candidate.
    pub fn submit_author(&mut self, candidate: &AuthorCandidate) -> GraphResult<Handle> {
        let record: Entity = candidate.record().into();
        match self.match_author(candidate)? {
            Some(winner) => {
                self.fold_into(winner, &record)?;
                Ok(winner)
            }
            None => Ok(self.create(record)),
        }
    }

    /// Merge a periodical candidate.
    pub fn submit_periodical(&mut self, candidate: &PeriodicalCandidate) -> GraphResult<Handle> {
        let record: Entity = candidate.record().into();
        match self.match_periodical(candidate) {
            Some(winner) => {
                self.fold_into(winner, &record)?;
                Ok(winner)
            }
            None => Ok(self.create(record)),
        }
    }

    /// Merge a keyword candidate.
    pub fn submit_keyword(&mut self, candidate: &KeywordCandidate) -> GraphResult<Handle> {
        let record: Entity = candidate.record().into();
        match self.match_keyword(candidate) {
            Some(winner) => {
                self.fold_into(winner, &record)?;
                Ok(winner)
            }
            None => Ok(self.create(record)),
        }
    }

    fn create(&mut self, record: Entity) -> Handle {
        let kind = record.kind();
        let label = record.label().to_string();
        let handle = self.insert_entity(record);
        debug!(handle = %handle, kind = %kind, label = %label, "Entity created");
        handle
    }

    fn fold_into(&mut self, winner: Handle, incoming: &Entity) -> GraphResult<Vec<String>> {
        let folded = self.modify_entity(winner, |current| fold_entity(current, incoming))?;
        let conflicts = match folded {
            Some(conflicts) => conflicts,
            None => {
                return Err(GraphError::KindMismatch {
                    handle: winner,
                    expected: incoming.kind(),
                    actual: self.store.kind_of(winner)?,
                })
            }
        };
        if conflicts.is_empty() {
            debug!(winner = %winner, kind = %incoming.kind(), "Candidate merged");
        } else {
            warn!(
                winner = %winner,
                kind = %incoming.kind(),
                conflicts = ?conflicts,
                "Candidate merged with conflicting values"
            );
        }
        Ok(conflicts)
    }

    /// Resolve every key the candidate tree touches without mutating.
    fn preflight_article(&self, candidate: &ArticleCandidate) -> GraphResult<()> {
        self.match_article(candidate)?;
        for author in &candidate.authors {
            self.match_author(author)?;
        }
        for reference in candidate.cites.iter().chain(&candidate.cited_by) {
            match reference {
                ArticleRef::Handle(h) => self.store.expect_kind(*h, EntityKind::Article)?,
                ArticleRef::Record(nested) => self.preflight_article(nested)?,
            }
        }
        Ok(())
    }

    fn apply_article(&mut self, candidate: &ArticleCandidate) -> GraphResult<Handle> {
        let record: Entity = candidate.record().into();
        let handle = match self.match_article(candidate)? {
            Some(winner) => {
                self.fold_into(winner, &record)?;
                winner
            }
            None => self.create(record),
        };

        for author in &candidate.authors {
            if normalize_key(&author.name).is_empty() {
                debug!(article = %handle, "Skipping author without a name");
                continue;
            }
            let author = self.submit_author(author)?;
            self.index.link(RelationKind::AuthoredBy, handle, author)?;
        }

        if let Some(periodical) = &candidate.periodical {
            let has_key = !normalize_key(&periodical.name).is_empty()
                || non_blank(periodical.issn.as_deref()).is_some();
            if has_key {
                let target = self.submit_periodical(periodical)?;
                self.attach_periodical(handle, target)?;
            }
        }

        for keyword in &candidate.keywords {
            if normalize_key(&keyword.label).is_empty() {
                continue;
            }
            let keyword = self.submit_keyword(keyword)?;
            self.index.link(RelationKind::TaggedWith, handle, keyword)?;
        }

        for reference in &candidate.cites {
            let target = self.resolve_ref(reference)?;
            self.index.link(RelationKind::Cites, handle, target)?;
        }
        for reference in &candidate.cited_by {
            let source = self.resolve_ref(reference)?;
            self.index.link(RelationKind::Cites, source, handle)?;
        }

        Ok(handle)
    }

    fn resolve_ref(&mut self, reference: &ArticleRef) -> GraphResult<Handle> {
        match reference {
            ArticleRef::Handle(h) => {
                self.store.expect_kind(*h, EntityKind::Article)?;
                Ok(*h)
            }
            ArticleRef::Record(nested) => self.apply_article(nested),
        }
    }

    /// Link an article to a periodical, or record a conflict if it already
    /// has a different one.
    fn attach_periodical(&mut self, article: Handle, periodical: Handle) -> GraphResult<()> {
        match self.index.targets(RelationKind::PublishedIn, article).first() {
            None => {
                self.index.link(RelationKind::PublishedIn, article, periodical)?;
            }
            Some(existing) if *existing == periodical => {}
            Some(existing) => {
                let name = self.store.periodical(periodical)?.name.clone();
                self.modify_entity(article, |e| record_conflict(e.notes_mut(), "periodical", &name))?;
                warn!(
                    article = %article,
                    existing = %existing,
                    candidate = %periodical,
                    "Conflicting periodical recorded in notes"
                );
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Explicit merge
    // ------------------------------------------------------------------

    /// Merge `loser` into `winner`.
    ///
    /// Fields are folded per the merge policy, every relationship of the
    /// loser is rewired onto the winner, and the loser's handle is retired.
    /// If both articles had a periodical and they differ, the winner keeps
    /// its own and the loser's is recorded in the winner's notes.
    pub fn merge_entities(&mut self, winner: Handle, loser: Handle) -> GraphResult<MergeReport> {
        if winner == loser {
            return Err(GraphError::InvalidMerge {
                winner,
                loser,
                reason: "cannot merge an entity into itself".to_string(),
            });
        }
        let winner_kind = self.store.kind_of(winner)?;
        self.store.expect_kind(loser, winner_kind)?;
        let loser_record = self.store.get(loser)?.clone();

        let rewired = self.index.rewire(loser, winner)?;
        let mut conflicts = Vec::new();
        for dropped in &rewired.dropped {
            if dropped.kind == RelationKind::PublishedIn {
                let name = self.store.periodical(dropped.to)?.name.clone();
                let added = self.modify_entity(winner, |e| {
                    record_conflict(e.notes_mut(), "periodical", &name)
                })?;
                if added {
                    conflicts.push(format!("periodical: {}", name));
                }
            }
        }

        self.retire_entity(loser)?;
        conflicts.extend(self.fold_into(winner, &loser_record)?);

        info!(
            winner = %winner,
            loser = %loser,
            kind = %winner_kind,
            moved = rewired.moved,
            dropped = rewired.dropped.len(),
            conflicts = conflicts.len(),
            "Entities merged"
        );

        Ok(MergeReport {
            winner,
            loser,
            moved_edges: rewired.moved,
            dropped_edges: rewired.dropped,
            conflicts,
        })
    }
}
