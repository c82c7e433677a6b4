//! Arena-backed entity store.

use crate::error::{GraphError, GraphResult};
use crate::types::{Article, Author, Entity, EntityKind, Handle, Keyword, Periodical};

/// Slot in the arena.
///
/// A retired slot keeps only the kind of the entity it held so that a stale
/// handle can be diagnosed but never resolved again.
#[derive(Debug, Clone)]
enum Slot {
    Live(Entity),
    Retired(EntityKind),
}

/// In-memory entity store.
///
/// Handles are indices into an append-only arena, starting at 1. Slots are
/// never reused, so iteration in slot order is creation order and handle
/// identity survives any number of merges and removals.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    slots: Vec<Slot>,
}

impl EntityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity and return its handle.
    pub fn create(&mut self, entity: impl Into<Entity>) -> Handle {
        self.slots.push(Slot::Live(entity.into()));
        Handle::from_raw(self.slots.len() as u64)
    }

    fn slot_index(&self, handle: Handle) -> Option<usize> {
        let raw = handle.as_u64();
        if raw == 0 || raw > self.slots.len() as u64 {
            return None;
        }
        Some((raw - 1) as usize)
    }

    /// Get a live entity.
    pub fn get(&self, handle: Handle) -> GraphResult<&Entity> {
        match self.slot_index(handle).map(|i| &self.slots[i]) {
            Some(Slot::Live(entity)) => Ok(entity),
            _ => Err(GraphError::NotFound(handle)),
        }
    }

    /// Get a live entity mutably.
    pub fn get_mut(&mut self, handle: Handle) -> GraphResult<&mut Entity> {
        match self.slot_index(handle) {
            Some(i) => match &mut self.slots[i] {
                Slot::Live(entity) => Ok(entity),
                Slot::Retired(_) => Err(GraphError::NotFound(handle)),
            },
            None => Err(GraphError::NotFound(handle)),
        }
    }

    /// Replace the record stored under a live handle.
    ///
    /// The replacement must be of the same kind. Returns the previous record.
    pub fn update(&mut self, handle: Handle, entity: impl Into<Entity>) -> GraphResult<Entity> {
        let entity = entity.into();
        let current = self.get_mut(handle)?;
        if current.kind() != entity.kind() {
            return Err(GraphError::KindMismatch {
                handle,
                expected: current.kind(),
                actual: entity.kind(),
            });
        }
        Ok(std::mem::replace(current, entity))
    }

    /// Retire a handle permanently and return the record it held.
    ///
    /// The caller is responsible for scrubbing relationship references first.
    pub fn retire(&mut self, handle: Handle) -> GraphResult<Entity> {
        let index = self.slot_index(handle).ok_or(GraphError::NotFound(handle))?;
        let kind = match &self.slots[index] {
            Slot::Live(entity) => entity.kind(),
            Slot::Retired(_) => return Err(GraphError::NotFound(handle)),
        };
        match std::mem::replace(&mut self.slots[index], Slot::Retired(kind)) {
            Slot::Live(entity) => Ok(entity),
            Slot::Retired(_) => Err(GraphError::NotFound(handle)),
        }
    }

    /// Whether the handle refers to a live entity.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Whether the handle was allocated and later retired.
    pub fn is_retired(&self, handle: Handle) -> bool {
        matches!(
            self.slot_index(handle).map(|i| &self.slots[i]),
            Some(Slot::Retired(_))
        )
    }

    /// Kind of a live entity.
    pub fn kind_of(&self, handle: Handle) -> GraphResult<EntityKind> {
        self.get(handle).map(Entity::kind)
    }

    /// Fail with `KindMismatch` unless the handle is a live entity of `expected` kind.
    pub fn expect_kind(&self, handle: Handle, expected: EntityKind) -> GraphResult<()> {
        let actual = self.kind_of(handle)?;
        if actual != expected {
            return Err(GraphError::KindMismatch { handle, expected, actual });
        }
        Ok(())
    }

    /// Live entities of a kind, in creation order.
    pub fn live(&self, kind: EntityKind) -> impl Iterator<Item = (Handle, &Entity)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| match slot {
            Slot::Live(entity) if entity.kind() == kind => {
                Some((Handle::from_raw(i as u64 + 1), entity))
            }
            _ => None,
        })
    }

    /// All live entities, in creation order.
    pub fn all_live(&self) -> impl Iterator<Item = (Handle, &Entity)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Live(entity) => Some((Handle::from_raw(i as u64 + 1), entity)),
            Slot::Retired(_) => None,
        })
    }

    /// Handles of live entities of a kind, in creation order.
    pub fn handles(&self, kind: EntityKind) -> Vec<Handle> {
        self.live(kind).map(|(h, _)| h).collect()
    }

    /// Number of live entities of a kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.live(kind).count()
    }

    /// Number of live entities of all kinds.
    pub fn len(&self) -> usize {
        self.all_live().count()
    }

    /// Whether the store has no live entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a live article.
    pub fn article(&self, handle: Handle) -> GraphResult<&Article> {
        let entity = self.get(handle)?;
        entity.as_article().ok_or(GraphError::KindMismatch {
            handle,
            expected: EntityKind::Article,
            actual: entity.kind(),
        })
    }

    /// Get a live article mutably.
    pub fn article_mut(&mut self, handle: Handle) -> GraphResult<&mut Article> {
        match self.get_mut(handle)? {
            Entity::Article(a) => Ok(a),
            other => Err(GraphError::KindMismatch {
                handle,
                expected: EntityKind::Article,
                actual: other.kind(),
            }),
        }
    }

    /// Get a live author.
    pub fn author(&self, handle: Handle) -> GraphResult<&Author> {
        let entity = self.get(handle)?;
        entity.as_author().ok_or(GraphError::KindMismatch {
            handle,
            expected: EntityKind::Author,
            actual: entity.kind(),
        })
    }

    /// Get a live periodical.
    pub fn periodical(&self, handle: Handle) -> GraphResult<&Periodical> {
        let entity = self.get(handle)?;
        entity.as_periodical().ok_or(GraphError::KindMismatch {
            handle,
            expected: EntityKind::Periodical,
            actual: entity.kind(),
        })
    }

    /// Get a live keyword.
    pub fn keyword(&self, handle: Handle) -> GraphResult<&Keyword> {
        let entity = self.get(handle)?;
        entity.as_keyword().ok_or(GraphError::KindMismatch {
            handle,
            expected: EntityKind::Keyword,
            actual: entity.kind(),
        })
    }
}
