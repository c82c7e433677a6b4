//! Graph state: store, relationship index and merge-key index.
//!
//! Every mutation of an entity record goes through [`GraphState::insert_entity`],
//! [`GraphState::modify_entity`] or [`GraphState::retire_entity`] so that the
//! key index never drifts from the store. Relationship mutations validate
//! entity kinds before touching the index.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, info};

use crate::error::{GraphError, GraphResult};
use crate::index::RelationIndex;
use crate::merge::keys::{keys_of, KeyIndex};
use crate::merge::MergeConfig;
use crate::store::EntityStore;
use crate::types::{Edge, Entity, EntityKind, Handle, RelationKind};

/// Mutable state of one bibliographic graph.
///
/// Not synchronized; [`SnowballGraph`](super::SnowballGraph) wraps it in a
/// single `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub(crate) store: EntityStore,
    pub(crate) index: RelationIndex,
    pub(crate) keys: KeyIndex,
    pub(crate) config: MergeConfig,
}

impl GraphState {
    /// Create an empty graph state.
    pub fn new(config: MergeConfig) -> Self {
        Self {
            store: EntityStore::new(),
            index: RelationIndex::new(),
            keys: KeyIndex::new(config.author_key),
            config,
        }
    }

    /// Entity store (read-only).
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Relationship index (read-only).
    pub fn index(&self) -> &RelationIndex {
        &self.index
    }

    /// Merge configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Entity mutation funnel
    // ------------------------------------------------------------------

    pub(crate) fn insert_entity(&mut self, entity: impl Into<Entity>) -> Handle {
        let handle = self.store.create(entity);
        if let Ok(stored) = self.store.get(handle) {
            self.keys.insert(handle, stored);
        }
        handle
    }

    pub(crate) fn modify_entity<R>(
        &mut self,
        handle: Handle,
        f: impl FnOnce(&mut Entity) -> R,
    ) -> GraphResult<R> {
        let entity = self.store.get_mut(handle)?;
        self.keys.remove(handle, entity);
        let out = f(&mut *entity);
        self.keys.insert(handle, entity);
        Ok(out)
    }

    /// Scrub every edge touching the handle and retire it.
    pub(crate) fn retire_entity(&mut self, handle: Handle) -> GraphResult<(Entity, Vec<Edge>)> {
        self.store.get(handle)?;
        let scrubbed = self.index.remove_all(handle)?;
        let entity = self.store.retire(handle)?;
        self.keys.remove(handle, &entity);
        Ok((entity, scrubbed))
    }

    /// Fail with `ConflictingIdentity` if a unique key of `entity` is claimed
    /// by a live handle other than `owner`.
    pub(crate) fn ensure_unique(&self, owner: Option<Handle>, entity: &Entity) -> GraphResult<()> {
        for (kind, key) in keys_of(entity, self.keys.policy()) {
            if !kind.is_unique() {
                continue;
            }
            let others: Vec<Handle> = self
                .keys
                .lookup(kind, &key)
                .iter()
                .copied()
                .filter(|h| Some(*h) != owner)
                .collect();
            if !others.is_empty() {
                let mut claimants = others;
                if let Some(owner) = owner {
                    claimants.push(owner);
                }
                return Err(GraphError::ConflictingIdentity {
                    kind: entity.kind(),
                    key,
                    claimants,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Public mutations
    // ------------------------------------------------------------------

    /// Replace the scalar fields of a live entity.
    ///
    /// Relationships are untouched. Fails with `KindMismatch` for a record of
    /// another kind and `ConflictingIdentity` if the new record would share a
    /// DOI or author key with another live entity.
    pub fn update(&mut self, handle: Handle, entity: impl Into<Entity>) -> GraphResult<Entity> {
        let entity = entity.into();
        self.store.expect_kind(handle, entity.kind())?;
        self.ensure_unique(Some(handle), &entity)?;
        let old = self.modify_entity(handle, |current| std::mem::replace(current, entity))?;
        debug!(handle = %handle, kind = %old.kind(), "Entity updated");
        Ok(old)
    }

    /// Link two entities, checking that both sides have the kinds the
    /// relationship requires. Returns `false` if the edge already existed.
    pub fn link(&mut self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        self.store.expect_kind(from, kind.source_kind())?;
        self.store.expect_kind(to, kind.target_kind())?;
        self.index.link(kind, from, to)
    }

    /// Remove a link. Returns `false` if it did not exist.
    pub fn unlink(&mut self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        self.store.get(from)?;
        self.store.get(to)?;
        self.index.unlink(kind, from, to)
    }

    /// Remove an entity, scrubbing all relationships that mention it.
    pub fn remove(&mut self, handle: Handle) -> GraphResult<Entity> {
        let (entity, scrubbed) = self.retire_entity(handle)?;
        info!(
            handle = %handle,
            kind = %entity.kind(),
            edges_removed = scrubbed.len(),
            "Entity removed"
        );
        Ok(entity)
    }

    // ------------------------------------------------------------------
    // Relationship queries
    // ------------------------------------------------------------------

    /// Articles cited by an article.
    pub fn cites(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(article, EntityKind::Article)?;
        Ok(self.index.targets(RelationKind::Cites, article))
    }

    /// Articles citing an article.
    pub fn cited_by(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(article, EntityKind::Article)?;
        Ok(self.index.sources(RelationKind::Cites, article))
    }

    /// Authors of an article in credited order.
    pub fn authors_of(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(article, EntityKind::Article)?;
        Ok(self.index.targets(RelationKind::AuthoredBy, article))
    }

    /// Articles written by an author.
    pub fn articles_by(&self, author: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(author, EntityKind::Author)?;
        Ok(self.index.sources(RelationKind::AuthoredBy, author))
    }

    /// Periodical an article appeared in.
    pub fn periodical_of(&self, article: Handle) -> GraphResult<Option<Handle>> {
        self.store.expect_kind(article, EntityKind::Article)?;
        Ok(self.index.targets(RelationKind::PublishedIn, article).first().copied())
    }

    /// Articles published in a periodical.
    pub fn articles_in(&self, periodical: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(periodical, EntityKind::Periodical)?;
        Ok(self.index.sources(RelationKind::PublishedIn, periodical))
    }

    /// Keywords of an article.
    pub fn keywords_of(&self, article: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(article, EntityKind::Article)?;
        Ok(self.index.targets(RelationKind::TaggedWith, article))
    }

    /// Articles tagged with a keyword.
    pub fn articles_tagged(&self, keyword: Handle) -> GraphResult<Vec<Handle>> {
        self.store.expect_kind(keyword, EntityKind::Keyword)?;
        Ok(self.index.sources(RelationKind::TaggedWith, keyword))
    }

    /// Citation neighbours of an article in both directions, deduplicated,
    /// cited articles first.
    pub fn citation_neighbours(&self, article: Handle) -> Vec<Handle> {
        let mut out = self.index.targets(RelationKind::Cites, article);
        for source in self.index.sources(RelationKind::Cites, article) {
            if !out.contains(&source) {
                out.push(source);
            }
        }
        out
    }

    /// Articles flagged as part of the seed set, in creation order.
    pub fn start_set(&self) -> Vec<Handle> {
        self.store
            .live(EntityKind::Article)
            .filter(|(_, e)| e.as_article().map(|a| a.start_set).unwrap_or(false))
            .map(|(h, _)| h)
            .collect()
    }

    /// Hop count from `from` to the nearest of `targets`, following
    /// citations in both directions.
    ///
    /// Returns `Ok(None)` when no target is reachable and `Ok(Some(0))` when
    /// `from` is itself a target. Breadth-first with a visited set, so
    /// citation cycles terminate.
    pub fn citation_distance(&self, from: Handle, targets: &[Handle]) -> GraphResult<Option<usize>> {
        self.store.expect_kind(from, EntityKind::Article)?;
        let targets: HashSet<Handle> = targets.iter().copied().collect();
        if targets.is_empty() {
            return Ok(None);
        }

        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([(from, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            if targets.contains(&current) {
                return Ok(Some(depth));
            }
            for next in self.citation_neighbours(current) {
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Check every graph invariant.
    ///
    /// - the index is symmetric
    /// - every handle the index mentions is live and of the right kind
    /// - no article has more than one periodical
    /// - no two live entities share a DOI or author key
    pub fn check_invariants(&self) -> GraphResult<()> {
        self.index.check_consistency()?;

        let mut seen = BTreeSet::new();
        for edge in self.index.edges() {
            if !seen.insert((edge.kind, edge.from)) && edge.kind.is_single_valued() {
                return Err(GraphError::Inconsistent(format!(
                    "{} has more than one {} target",
                    edge.from, edge.kind
                )));
            }
            for (handle, kind) in [
                (edge.from, edge.kind.source_kind()),
                (edge.to, edge.kind.target_kind()),
            ] {
                match self.store.kind_of(handle) {
                    Ok(actual) if actual == kind => {}
                    Ok(actual) => {
                        return Err(GraphError::Inconsistent(format!(
                            "{} edge {} -> {} touches a {}",
                            edge.kind, edge.from, edge.to, actual
                        )))
                    }
                    Err(_) => {
                        return Err(GraphError::Inconsistent(format!(
                            "{} edge {} -> {} references dead handle {}",
                            edge.kind, edge.from, edge.to, handle
                        )))
                    }
                }
            }
        }

        if let Some((kind, key, claimants)) = self.keys.violations().into_iter().next() {
            let entity_kind = match kind {
                crate::merge::keys::KeyKind::AuthorName => EntityKind::Author,
                _ => EntityKind::Article,
            };
            return Err(GraphError::ConflictingIdentity {
                kind: entity_kind,
                key,
                claimants,
            });
        }
        Ok(())
    }
}
