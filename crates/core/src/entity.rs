//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Stored domain objects implement this so the storage layer can key
/// collections without knowing anything else about the type.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
