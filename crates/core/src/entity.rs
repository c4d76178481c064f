//! Entity traits: identity + ownership.

use crate::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// A record that belongs to exactly one user.
///
/// Authorization only ever needs the owner, so policy code takes `&dyn Owned`
/// instead of a concrete record type.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

impl Owned for UserId {
    fn owner_id(&self) -> UserId {
        *self
    }
}
