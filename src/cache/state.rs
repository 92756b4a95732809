use std::fmt;

/// Lifecycle state of a cached entity within one command.
///
/// State transitions:
/// ```text
/// TRANSIENT  ──set_deleted──> DELETED_TRANSIENT
/// PERSISTENT ──set_deleted──> DELETED_PERSISTENT
/// MERGED     ──set_deleted──> DELETED_MERGED
/// ```
/// Any `DELETED_*` state is terminal for the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEntityState {
    /// Created in this command, not yet persisted.
    Transient,
    /// Loaded from storage; a snapshot is kept for flush-time diffing.
    Persistent,
    /// Detached entity re-attached to this command; known dirty.
    Merged,
    DeletedTransient,
    DeletedPersistent,
    DeletedMerged,
}

impl DbEntityState {
    pub fn is_deleted(&self) -> bool {
        matches!(
            self,
            Self::DeletedTransient | Self::DeletedPersistent | Self::DeletedMerged
        )
    }
}

impl fmt::Display for DbEntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "TRANSIENT",
            Self::Persistent => "PERSISTENT",
            Self::Merged => "MERGED",
            Self::DeletedTransient => "DELETED_TRANSIENT",
            Self::DeletedPersistent => "DELETED_PERSISTENT",
            Self::DeletedMerged => "DELETED_MERGED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_predicate() {
        assert!(!DbEntityState::Transient.is_deleted());
        assert!(!DbEntityState::Persistent.is_deleted());
        assert!(!DbEntityState::Merged.is_deleted());
        assert!(DbEntityState::DeletedTransient.is_deleted());
        assert!(DbEntityState::DeletedPersistent.is_deleted());
        assert!(DbEntityState::DeletedMerged.is_deleted());
    }
}
