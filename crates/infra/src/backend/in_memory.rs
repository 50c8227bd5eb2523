use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};
use uuid::Uuid;

use bakehouse_bakery::{EntityKind, Record};
use bakehouse_core::EntityId;

use super::r#trait::{BackendError, PersistenceBackend, Transaction};

type Rows = BTreeMap<EntityId, Record>;

/// In-memory relational store.
///
/// One writer at a time: a transaction holds the table lock until it commits
/// or rolls back and works on a private copy of the rows. Intended for tests
/// and embedding, not for large data sets.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    rows: Mutex<Rows>,
    sequence: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows across all kinds.
    pub fn len(&self) -> Result<usize, BackendError> {
        Ok(self.rows()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.rows()?.is_empty())
    }

    /// Highest id handed out so far, committed or not.
    pub fn last_allocated(&self) -> Option<EntityId> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            n => Some(EntityId::new(n)),
        }
    }

    fn rows(&self) -> Result<MutexGuard<'_, Rows>, BackendError> {
        self.rows
            .lock()
            .map_err(|_| BackendError::Unavailable("lock poisoned".to_string()))
    }
}

impl PersistenceBackend for InMemoryBackend {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, BackendError> {
        let committed = self.rows()?;
        let working = committed.clone();
        let id = Uuid::now_v7();
        trace!(tx = %id, rows = working.len(), "transaction opened");
        Ok(Box::new(InMemoryTransaction {
            id,
            committed,
            working,
            sequence: &self.sequence,
        }))
    }

    fn find(&self, id: EntityId) -> Result<Option<Record>, BackendError> {
        Ok(self.rows()?.get(&id).cloned())
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, BackendError> {
        Ok(self
            .rows()?
            .values()
            .filter(|row| row.kind() == kind)
            .cloned()
            .collect())
    }
}

struct InMemoryTransaction<'a> {
    id: Uuid,
    committed: MutexGuard<'a, Rows>,
    working: Rows,
    sequence: &'a AtomicU64,
}

impl InMemoryTransaction<'_> {
    fn check_unique(&self, record: &Record) -> Result<(), BackendError> {
        let keys = record.unique_keys();
        if keys.is_empty() {
            return Ok(());
        }

        let others = self
            .working
            .values()
            .filter(|row| row.kind() == record.kind() && row.id() != record.id());
        for other in others {
            if let Some(key) = other.unique_keys().into_iter().find(|k| keys.contains(k)) {
                return Err(BackendError::Unique {
                    kind: record.kind(),
                    field: key.field,
                    value: key.value,
                });
            }
        }
        Ok(())
    }

    fn check_foreign_keys(&self) -> Result<(), BackendError> {
        for (id, row) in &self.working {
            for fk in row.foreign_keys() {
                let resolved = self
                    .working
                    .get(&fk.target)
                    .is_some_and(|target| target.kind() == fk.target_kind());
                if !resolved {
                    return Err(BackendError::ForeignKey {
                        kind: row.kind(),
                        id: *id,
                        relation: fk.relation,
                        target: fk.target,
                    });
                }
            }
        }
        Ok(())
    }

    fn stored_kind(&self, id: EntityId) -> Option<EntityKind> {
        self.working.get(&id).map(Record::kind)
    }
}

impl Transaction for InMemoryTransaction<'_> {
    fn id(&self) -> Uuid {
        self.id
    }

    fn allocate_id(&mut self) -> EntityId {
        EntityId::new(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn insert(&mut self, mut record: Record) -> Result<EntityId, BackendError> {
        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = self.allocate_id();
                record
                    .assign_identity(id)
                    .map_err(|err| BackendError::Unavailable(err.to_string()))?;
                id
            }
        };
        if self.working.contains_key(&id) {
            return Err(BackendError::Exists { id });
        }
        self.check_unique(&record)?;
        trace!(tx = %self.id, kind = %record.kind(), %id, "insert");
        self.working.insert(id, record);
        Ok(id)
    }

    fn update(&mut self, record: Record) -> Result<(), BackendError> {
        let kind = record.kind();
        let id = record.id().ok_or_else(|| {
            BackendError::Unavailable(format!("cannot update a transient {kind}"))
        })?;
        if self.stored_kind(id) != Some(kind) {
            return Err(BackendError::Missing { kind, id });
        }
        self.check_unique(&record)?;
        trace!(tx = %self.id, %kind, %id, "update");
        self.working.insert(id, record);
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> Result<(), BackendError> {
        if self.stored_kind(id) != Some(kind) {
            return Err(BackendError::Missing { kind, id });
        }
        trace!(tx = %self.id, %kind, %id, "delete");
        self.working.remove(&id);
        Ok(())
    }

    fn find(&self, id: EntityId) -> Option<Record> {
        self.working.get(&id).cloned()
    }

    fn commit(self: Box<Self>) -> Result<(), BackendError> {
        self.check_foreign_keys()?;
        let InMemoryTransaction {
            id,
            mut committed,
            working,
            ..
        } = *self;
        debug!(tx = %id, rows = working.len(), "transaction committed");
        *committed = working;
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(tx = %self.id, "transaction rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakehouse_bakery::{Bakery, Ingredient, Persistent, Relation, Task};

    fn ingredient(name: &str) -> Record {
        Ingredient::new(name).into_record()
    }

    #[test]
    fn commit_publishes_and_rollback_discards() {
        let backend = InMemoryBackend::new();

        let mut tx = backend.begin().unwrap();
        let kept = tx.insert(ingredient("Farinha")).unwrap();
        tx.commit().unwrap();

        let mut tx = backend.begin().unwrap();
        let dropped = tx.insert(ingredient("Sal")).unwrap();
        tx.delete(EntityKind::Ingredient, kept).unwrap();
        assert!(tx.find(dropped).is_some());
        tx.rollback();

        assert!(backend.find(kept).unwrap().is_some());
        assert!(backend.find(dropped).unwrap().is_none());
        assert_eq!(backend.len().unwrap(), 1);
    }

    #[test]
    fn dropping_a_transaction_discards_its_writes() {
        let backend = InMemoryBackend::new();
        {
            let mut tx = backend.begin().unwrap();
            tx.insert(ingredient("Fermento")).unwrap();
        }
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn ids_are_not_reused_after_rollback() {
        let backend = InMemoryBackend::new();

        let mut tx = backend.begin().unwrap();
        let first = tx.insert(ingredient("Açúcar")).unwrap();
        tx.rollback();

        let mut tx = backend.begin().unwrap();
        let second = tx.insert(ingredient("Açúcar")).unwrap();
        tx.commit().unwrap();

        assert!(second > first);
        assert_eq!(backend.last_allocated(), Some(second));
    }

    #[test]
    fn unique_keys_are_checked_per_kind() {
        let backend = InMemoryBackend::new();
        let mut tx = backend.begin().unwrap();
        tx.insert(Bakery::new("Central", "12345678000199").into_record()).unwrap();

        let err = tx
            .insert(Bakery::new("Filial", "12345678000199").into_record())
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::Unique {
                kind: EntityKind::Bakery,
                field: "tax_id",
                value: "12345678000199".to_string(),
            }
        );

        // Same text under another kind does not clash.
        tx.insert(ingredient("12345678000199")).unwrap();
    }

    #[test]
    fn foreign_keys_are_checked_at_commit() {
        let backend = InMemoryBackend::new();
        let mut tx = backend.begin().unwrap();
        let mut task = Task::default().into_record();
        task.link(Relation::EmployeeTasks, EntityId::new(404)).unwrap();
        let task_id = tx.insert(task).unwrap();

        let err = tx.commit().unwrap_err();
        assert_eq!(
            err,
            BackendError::ForeignKey {
                kind: EntityKind::Task,
                id: task_id,
                relation: Relation::EmployeeTasks,
                target: EntityId::new(404),
            }
        );
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn update_and_delete_require_an_existing_row_of_the_same_kind() {
        let backend = InMemoryBackend::new();
        let mut tx = backend.begin().unwrap();
        let id = tx.insert(ingredient("Leite")).unwrap();

        let err = tx.delete(EntityKind::Bread, id).unwrap_err();
        assert_eq!(err, BackendError::Missing { kind: EntityKind::Bread, id });

        let mut stray = ingredient("Manteiga");
        stray.assign_identity(EntityId::new(999)).unwrap();
        assert!(matches!(tx.update(stray), Err(BackendError::Missing { .. })));
    }

    #[test]
    fn scan_returns_rows_of_one_kind() {
        let backend = InMemoryBackend::new();
        let mut tx = backend.begin().unwrap();
        tx.insert(ingredient("Ovos")).unwrap();
        tx.insert(ingredient("Canela")).unwrap();
        tx.insert(Bakery::new("Central", "12345678000199").into_record()).unwrap();
        tx.commit().unwrap();

        assert_eq!(backend.scan(EntityKind::Ingredient).unwrap().len(), 2);
        assert_eq!(backend.scan(EntityKind::Bakery).unwrap().len(), 1);
        assert!(backend.scan(EntityKind::Order).unwrap().is_empty());
    }
}
