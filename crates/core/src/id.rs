//! Surrogate identity of stored entities.

use serde::{Deserialize, Serialize};

use crate::error::{IntegrityError, IntegrityResult};

/// Storage-assigned primary key.
///
/// Opaque and numeric. Ids come from a single sequence shared by every table,
/// so an id alone is enough to tell two rows apart, and a freed id is never
/// handed out again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<EntityId> for u64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Lifecycle-aware identity of an entity instance.
///
/// `Transient` entities have never been saved. `Persisted` entities carry the
/// id storage gave them on their first successful save; that id never changes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    #[default]
    Transient,
    Persisted(EntityId),
}

impl Identity {
    pub fn id(self) -> Option<EntityId> {
        match self {
            Identity::Transient => None,
            Identity::Persisted(id) => Some(id),
        }
    }

    pub fn is_persisted(self) -> bool {
        matches!(self, Identity::Persisted(_))
    }

    /// Entity equality: both sides persisted under the same id.
    ///
    /// Transient identities never denote the same entity, not even each other.
    pub fn same_entity(self, other: Identity) -> bool {
        matches!((self, other), (Identity::Persisted(a), Identity::Persisted(b)) if a == b)
    }

    /// Assign the storage id. Succeeds once; re-assigning the same id is a no-op.
    pub fn assign(&mut self, id: EntityId) -> IntegrityResult<()> {
        match *self {
            Identity::Transient => {
                *self = Identity::Persisted(id);
                Ok(())
            }
            Identity::Persisted(current) if current == id => Ok(()),
            Identity::Persisted(current) => Err(IntegrityError::invariant(format!(
                "identity {current} cannot be replaced by {id}"
            ))),
        }
    }
}

impl From<EntityId> for Identity {
    fn from(value: EntityId) -> Self {
        Identity::Persisted(value)
    }
}
