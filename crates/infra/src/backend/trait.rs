use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use bakehouse_bakery::{EntityKind, Record, Relation};
use bakehouse_core::{EntityId, IntegrityError};

/// Storage-level failure reported by a backend.
///
/// These are the constraint failures a relational store would raise, plus
/// availability problems. The integrity engine maps them into
/// [`IntegrityError`] before they reach the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("unique constraint on {kind}.{field} violated by '{value}'")]
    Unique {
        kind: EntityKind,
        field: &'static str,
        value: String,
    },

    #[error("foreign key {relation} on {kind} {id} references missing row {target}")]
    ForeignKey {
        kind: EntityKind,
        id: EntityId,
        relation: Relation,
        target: EntityId,
    },

    #[error("{kind} {id} does not exist")]
    Missing { kind: EntityKind, id: EntityId },

    #[error("row {id} already exists")]
    Exists { id: EntityId },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<BackendError> for IntegrityError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Unique { kind, field, value } => {
                IntegrityError::uniqueness(kind.name(), field, value)
            }
            BackendError::ForeignKey {
                kind,
                id,
                relation,
                target,
            } => IntegrityError::referential(
                kind.name(),
                Some(id),
                relation.name(),
                format!("references missing row {target}"),
            ),
            BackendError::Missing { kind, id } => IntegrityError::not_found(kind.name(), id),
            BackendError::Exists { id } => {
                IntegrityError::invariant(format!("row {id} is already stored"))
            }
            BackendError::Unavailable(msg) => IntegrityError::backend(msg),
        }
    }
}

/// Durable row storage the integrity engine writes through.
///
/// Rows are shallow [`Record`]s keyed by their surrogate id. Ids come from one
/// sequence shared by every kind, so an id alone identifies a row.
pub trait PersistenceBackend: Send + Sync {
    /// Open a transaction. Every write of one engine operation goes through it.
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, BackendError>;

    /// Committed row by id.
    fn find(&self, id: EntityId) -> Result<Option<Record>, BackendError>;

    /// Every committed row of one kind, in id order.
    fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, BackendError>;
}

/// A unit of work against a backend.
///
/// Dropping a transaction without committing discards its writes.
pub trait Transaction {
    fn id(&self) -> Uuid;

    /// Reserve the next surrogate id. Reserved ids are never handed out again,
    /// even when the transaction rolls back.
    fn allocate_id(&mut self) -> EntityId;

    /// Store a new row. A transient record gets an id allocated here.
    fn insert(&mut self, record: Record) -> Result<EntityId, BackendError>;

    fn update(&mut self, record: Record) -> Result<(), BackendError>;

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> Result<(), BackendError>;

    /// Row by id as seen by this transaction, including its own writes.
    fn find(&self, id: EntityId) -> Option<Record>;

    /// Check deferred constraints and publish the writes.
    fn commit(self: Box<Self>) -> Result<(), BackendError>;

    fn rollback(self: Box<Self>);
}

impl<B> PersistenceBackend for Arc<B>
where
    B: PersistenceBackend + ?Sized,
{
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, BackendError> {
        (**self).begin()
    }

    fn find(&self, id: EntityId) -> Result<Option<Record>, BackendError> {
        (**self).find(id)
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, BackendError> {
        (**self).scan(kind)
    }
}
