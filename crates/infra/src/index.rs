//! Inverse relationship views.
//!
//! Every link is stored once, as a foreign key on the owning row. The index
//! keeps both directions of each link keyed by that foreign key so the engine
//! can answer "children of" and "parents of" without walking the object graph.
//! Only the engine mutates it, always from rows it has just written.

use std::collections::{BTreeSet, HashMap};

use bakehouse_bakery::{ForeignKey, Record, Relation};
use bakehouse_core::EntityId;

#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    children: HashMap<(Relation, EntityId), BTreeSet<EntityId>>,
    parents: HashMap<(Relation, EntityId), BTreeSet<EntityId>>,
    held: HashMap<EntityId, Vec<ForeignKey>>,
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.upsert(record);
        }
        index
    }

    /// Replace the links held by `record` with its current foreign keys.
    /// Transient records are ignored.
    pub fn upsert(&mut self, record: &Record) {
        let Some(id) = record.id() else {
            return;
        };
        self.remove(id);

        let keys = record.foreign_keys();
        for fk in &keys {
            let (owner, child) = fk.endpoints(id);
            self.children.entry((fk.relation, owner)).or_default().insert(child);
            self.parents.entry((fk.relation, child)).or_default().insert(owner);
        }
        self.held.insert(id, keys);
    }

    /// Forget the links held by row `id`.
    pub fn remove(&mut self, id: EntityId) {
        let Some(keys) = self.held.remove(&id) else {
            return;
        };
        for fk in keys {
            let (owner, child) = fk.endpoints(id);
            Self::detach(&mut self.children, (fk.relation, owner), child);
            Self::detach(&mut self.parents, (fk.relation, child), owner);
        }
    }

    pub fn children(&self, relation: Relation, owner: EntityId) -> Vec<EntityId> {
        Self::lookup(&self.children, (relation, owner))
    }

    pub fn parents(&self, relation: Relation, child: EntityId) -> Vec<EntityId> {
        Self::lookup(&self.parents, (relation, child))
    }

    pub fn is_linked(&self, relation: Relation, owner: EntityId, child: EntityId) -> bool {
        self.children
            .get(&(relation, owner))
            .is_some_and(|set| set.contains(&child))
    }

    /// Number of rows holding at least one tracked key.
    pub fn len(&self) -> usize {
        self.held.values().filter(|keys| !keys.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(
        map: &HashMap<(Relation, EntityId), BTreeSet<EntityId>>,
        key: (Relation, EntityId),
    ) -> Vec<EntityId> {
        map.get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn detach(
        map: &mut HashMap<(Relation, EntityId), BTreeSet<EntityId>>,
        key: (Relation, EntityId),
        value: EntityId,
    ) {
        if let Some(set) = map.get_mut(&key) {
            set.remove(&value);
            if set.is_empty() {
                map.remove(&key);
            }
        }
    }
}
