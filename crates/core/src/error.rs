//! Integrity error model.

use thiserror::Error;

use crate::id::EntityId;
use crate::violation::Violations;

/// Result type used across the domain and the integrity engine.
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Caller-facing failure of a save/merge/delete.
///
/// Every variant is deterministic: retrying with the same input fails the same
/// way. Whatever the variant, the enclosing transaction has been rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// One or more field rules failed; carries the complete list for the entity.
    #[error("{entity} failed validation: {violations}")]
    Validation {
        entity: String,
        violations: Violations,
    },

    /// A uniquely-constrained value is already taken.
    #[error("{entity}.{field} must be unique, '{value}' already exists")]
    Uniqueness {
        entity: String,
        field: String,
        value: String,
    },

    /// A required relationship is missing, or a row is still referenced.
    #[error("referential integrity violated on {entity}{} via {relation}: {reason}", fmt_id(.id))]
    ReferentialIntegrity {
        entity: String,
        id: Option<EntityId>,
        relation: String,
        reason: String,
    },

    /// The referenced identity does not resolve in storage.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: EntityId },

    /// A lifecycle invariant was broken (e.g. re-assigning an identity).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Storage could not serve the request.
    #[error("backend failure: {0}")]
    Backend(String),
}

fn fmt_id(id: &Option<EntityId>) -> String {
    match id {
        Some(id) => format!(" {id}"),
        None => String::new(),
    }
}

impl IntegrityError {
    pub fn validation(entity: impl Into<String>, violations: Violations) -> Self {
        Self::Validation {
            entity: entity.into(),
            violations,
        }
    }

    pub fn uniqueness(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Uniqueness {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn referential(
        entity: impl Into<String>,
        id: Option<EntityId>,
        relation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferentialIntegrity {
            entity: entity.into(),
            id,
            relation: relation.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: EntityId) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_uniqueness(&self) -> bool {
        matches!(self, Self::Uniqueness { .. })
    }

    pub fn is_referential(&self) -> bool {
        matches!(self, Self::ReferentialIntegrity { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Violations carried by a validation failure.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Validation { violations, .. } => Some(violations),
            _ => None,
        }
    }
}
