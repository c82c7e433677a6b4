//! Error taxonomy for graph operations.

use crate::types::{EntityKind, Handle, RelationKind};

/// Error type for graph operations.
///
/// `NotFound` and `KindMismatch` indicate a collaborator passed a stale or
/// wrong handle. `ConflictingIdentity` and `InvalidRelationship` are data
/// quality problems that are reported per record. `Inconsistent` means the
/// relationship index found itself in an asymmetric state and the current
/// operation was aborted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Handle unknown or retired.
    #[error("Entity not found: {0}")]
    NotFound(Handle),

    /// Handle refers to an entity of another kind.
    #[error("Entity {handle} is a {actual}, expected {expected}")]
    KindMismatch {
        /// Offending handle.
        handle: Handle,
        /// Kind the operation required.
        expected: EntityKind,
        /// Kind actually stored under the handle.
        actual: EntityKind,
    },

    /// Two different live entities claim the same uniqueness key.
    #[error("Conflicting identity for {kind} key '{key}': claimed by {claimants:?}")]
    ConflictingIdentity {
        /// Entity kind.
        kind: EntityKind,
        /// Normalized key value.
        key: String,
        /// Live handles claiming the key.
        claimants: Vec<Handle>,
    },

    /// Relationship rejected (e.g. a second periodical for one article).
    #[error("Invalid {kind} relationship {from} -> {to}: {reason}")]
    InvalidRelationship {
        /// Relationship kind.
        kind: RelationKind,
        /// Source handle.
        from: Handle,
        /// Target handle.
        to: Handle,
        /// Why the relationship was rejected.
        reason: String,
    },

    /// Explicit merge request that cannot be honored (e.g. merging a handle into itself).
    #[error("Invalid merge of {loser} into {winner}: {reason}")]
    InvalidMerge {
        /// Surviving handle.
        winner: Handle,
        /// Handle that would be retired.
        loser: Handle,
        /// Why the merge was rejected.
        reason: String,
    },

    /// Internal consistency violation in the relationship index.
    #[error("Internal consistency error: {0}")]
    Inconsistent(String),

    /// Persisted document could not be restored.
    #[error("Invalid graph document: {0}")]
    Document(String),
}

impl GraphError {
    /// Whether this error must abort a batch operation.
    ///
    /// Everything except an internal consistency violation is a per-record
    /// problem: batch submission and expansion report it and move on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }

    /// Whether this error is a data-quality problem in the submitted records
    /// rather than a bad handle supplied by the caller.
    pub fn is_data_conflict(&self) -> bool {
        matches!(
            self,
            Self::ConflictingIdentity { .. } | Self::InvalidRelationship { .. }
        )
    }
}

/// Convenience alias.
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let conflict = GraphError::ConflictingIdentity {
            kind: EntityKind::Article,
            key: "10.1/a".to_string(),
            claimants: vec![Handle::from_raw(1), Handle::from_raw(2)],
        };
        assert!(conflict.is_data_conflict());
        assert!(!conflict.is_fatal());
        assert!(!GraphError::NotFound(Handle::from_raw(1)).is_data_conflict());
        assert!(!GraphError::NotFound(Handle::from_raw(1)).is_fatal());
        assert!(GraphError::Inconsistent("x".into()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = GraphError::NotFound(Handle::from_raw(9));
        assert_eq!(err.to_string(), "Entity not found: #9");
    }
}
