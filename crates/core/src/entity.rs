//! Entity trait: identity + continuity across state changes.

use crate::id::{EntityId, Identity};

/// Entity marker + minimal interface.
///
/// Equality of entities is identity equality (see [`Identity::same_entity`]),
/// never attribute equality.
pub trait Entity {
    /// Name used in errors and logs (e.g. `"Bakery"`).
    const NAME: &'static str;

    /// Returns the entity identity.
    fn identity(&self) -> Identity;

    fn id(&self) -> Option<EntityId> {
        self.identity().id()
    }

    fn is_persisted(&self) -> bool {
        self.identity().is_persisted()
    }
}
