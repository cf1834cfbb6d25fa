//! Optimistic-concurrency revision tracking for mutable entities.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Monotonically increasing revision of an entity's stored state.
///
/// Incremented on every successful save; a stale revision on save indicates
/// a concurrent writer and is rejected as a conflict.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Implemented by entities whose saves are revision-checked.
pub trait Versioned {
    fn revision(&self) -> Revision;
    fn bump_revision(&mut self);
}

/// Revision expectation attached to a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// Skip revision checking (useful for idempotent writes, imports, etc.).
    Any,
    /// Require the entity to be at an exact revision.
    Exact(Revision),
}

impl ExpectedRevision {
    pub fn matches(self, actual: Revision) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::Exact(r) => r == actual,
        }
    }

    pub fn check(self, actual: Revision) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale revision (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_revision_mismatch_is_conflict() {
        let expected = ExpectedRevision::Exact(Revision::initial());
        let err = expected.check(Revision::initial().next()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn any_revision_always_matches() {
        assert!(ExpectedRevision::Any.matches(Revision::initial().next().next()));
    }
}
