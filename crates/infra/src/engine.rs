//! Relationship integrity engine.
//!
//! Every mutation runs through one pipeline:
//!
//! ```text
//! entity graph
//!   ↓
//! 1. Flatten owned collections into shallow rows (owners first)
//!   ↓
//! 2. Reserve identities, link foreign keys and back-references
//!   ↓
//! 3. Validate every row (first failing entity aborts with all its violations)
//!   ↓
//! 4. Check required relationships and reference targets
//!   ↓
//! 5. Write rows owners-first, cascade deletes leaves-first
//!   ↓
//! 6. Commit, then publish the staged relation index
//! ```
//!
//! Any failure rolls the transaction back; storage, the relation index and the
//! caller's entity are left exactly as they were.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use bakehouse_bakery::{EntityKind, FkSide, OnDelete, Persistent, Record, Relation, Schema};
use bakehouse_core::{EntityId, IntegrityError, IntegrityResult, Violations};
use bakehouse_validation::{Validate, ValidationEngine};

use crate::backend::{PersistenceBackend, Transaction};
use crate::config::BakehouseConfig;
use crate::graph::Graph;
use crate::index::RelationIndex;

/// Enforces cascade, orphan-removal, back-reference and uniqueness rules on
/// top of a [`PersistenceBackend`].
///
/// The engine owns the inverse-relationship index. Operations are serialised
/// on it: each one stages its index changes on a copy and publishes the copy
/// only after the backend commit succeeds.
pub struct IntegrityEngine<B> {
    backend: B,
    schema: Schema,
    validator: ValidationEngine,
    index: Mutex<RelationIndex>,
}

impl<B: core::fmt::Debug> core::fmt::Debug for IntegrityEngine<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntegrityEngine")
            .field("backend", &self.backend)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl<B: PersistenceBackend> IntegrityEngine<B> {
    /// Engine with the default validation predicates.
    pub fn new(backend: B) -> IntegrityResult<Self> {
        Self::with_validator(backend, ValidationEngine::new())
    }

    pub fn from_config(backend: B, config: &BakehouseConfig) -> IntegrityResult<Self> {
        Self::with_validator(backend, ValidationEngine::from_config(&config.validation))
    }

    /// Build the engine and rebuild the relation index from the rows already
    /// stored in `backend`.
    pub fn with_validator(backend: B, validator: ValidationEngine) -> IntegrityResult<Self> {
        let schema = Schema::standard()?;
        let mut index = RelationIndex::new();
        for kind in schema.save_order() {
            for record in backend.scan(*kind)? {
                index.upsert(&record);
            }
        }
        debug!(linked_rows = index.len(), "relation index rebuilt");

        Ok(Self {
            backend,
            schema,
            validator,
            index: Mutex::new(index),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    /// Field-level check of one entity; never touches storage.
    pub fn validate<T: Validate + ?Sized>(&self, entity: &T) -> Violations {
        self.validator.validate(entity)
    }

    /// Persist `entity` and every child embedded in its owned collections.
    ///
    /// Transient entities get their identity here; `entity` (children
    /// included) is updated with identities and links only when the whole
    /// cascade commits.
    ///
    /// Collections of an owner obtained from [`IntegrityEngine::load`] or a
    /// previous `save` are complete: a stored child no longer in them is
    /// deleted, with its own cascade, in the same transaction. Collections of
    /// a shallow [`IntegrityEngine::find`] result only add or update children.
    /// Installing a new bank account on an employee always removes the one it
    /// replaces.
    #[instrument(skip_all, fields(kind = T::NAME, id = ?entity.id()))]
    pub fn save<T: Persistent>(&self, entity: &mut T) -> IntegrityResult<EntityId> {
        let mut graph = self.transact("save", |tx, staged| {
            self.save_graph(tx, staged, entity.clone().into_record())
        })?;
        for node in graph.nodes_mut() {
            let hydrated = node.is_new() || node.record.is_hydrated();
            node.record.set_hydrated(hydrated);
        }

        let root = graph.assemble()?;
        let id = root
            .id()
            .ok_or_else(|| IntegrityError::invariant("saved root has no identity"))?;
        *entity = T::from_record(root)
            .ok_or_else(|| IntegrityError::invariant(format!("saved row is not a {}", T::NAME)))?;
        Ok(id)
    }

    /// Reconcile a detached copy onto the stored row with the same identity
    /// and return the managed instance, hydrated.
    ///
    /// The argument is never modified. A transient argument is persisted as a
    /// new entity; a persisted one must still exist.
    #[instrument(skip_all, fields(kind = T::NAME, id = ?detached.id()))]
    pub fn merge<T: Persistent>(&self, detached: &T) -> IntegrityResult<T> {
        let mut managed = detached.clone();
        let id = self.save(&mut managed)?;
        self.load::<T>(id)?
            .ok_or_else(|| IntegrityError::not_found(T::NAME, id))
    }

    /// Delete `entity` and the transitive closure of its cascade children.
    #[instrument(skip_all, fields(kind = T::NAME, id = ?entity.id()))]
    pub fn delete<T: Persistent>(&self, entity: &T) -> IntegrityResult<()> {
        let id = entity.id().ok_or_else(|| {
            IntegrityError::invariant(format!("cannot delete a transient {}", T::NAME))
        })?;
        self.delete_by_id(T::KIND, id)
    }

    #[instrument(skip(self))]
    pub fn delete_by_id(&self, kind: EntityKind, id: EntityId) -> IntegrityResult<()> {
        self.transact("delete", |tx, staged| {
            Self::stored(tx, kind, id)?;
            self.delete_cascade(tx, staged, kind, id).map(|_| ())
        })
    }

    /// Detach `child` from `parent`'s collection for `relation`.
    ///
    /// On orphan-removal relations the child (and its own cascade) is deleted
    /// in the same transaction as the parent's update; on link-only relations
    /// just the link goes. `parent`'s in-memory collection is updated on
    /// success.
    #[instrument(skip(self, parent), fields(kind = P::NAME, id = ?parent.id()))]
    pub fn remove_from_collection<P: Persistent>(
        &self,
        parent: &mut P,
        relation: Relation,
        child: EntityId,
    ) -> IntegrityResult<()> {
        let def = self.schema.relation(relation)?;
        if def.owner != P::KIND {
            return Err(IntegrityError::invariant(format!(
                "{relation} is not a collection of {}",
                P::NAME
            )));
        }
        let parent_id = parent.id().ok_or_else(|| {
            IntegrityError::invariant(format!("a transient {} has no stored collection", P::NAME))
        })?;

        self.transact("remove_from_collection", |tx, staged| {
            let mut owner = Self::stored(tx, P::KIND, parent_id)?;
            if !staged.is_linked(relation, parent_id, child) {
                return Err(IntegrityError::referential(
                    P::NAME,
                    Some(parent_id),
                    relation.name(),
                    format!("{} {child} is not in this collection", def.child),
                ));
            }

            // Keys held by the child go with the child; every such relation
            // removes orphans.
            if def.fk_side == FkSide::Owner {
                owner.unlink(relation, child);
                staged.upsert(&owner);
                tx.update(owner)?;
            }
            if def.orphan_removal {
                self.delete_cascade(tx, staged, def.child, child)?;
            }
            Ok(())
        })?;

        let mut record = parent.clone().into_record();
        record.remove_child(relation, child);
        *parent = P::from_record(record)
            .ok_or_else(|| IntegrityError::invariant(format!("row is not a {}", P::NAME)))?;
        Ok(())
    }

    /// The stored row as saved, owned collections left empty.
    pub fn find<T: Persistent>(&self, id: EntityId) -> IntegrityResult<Option<T>> {
        Ok(self.backend.find(id)?.and_then(T::from_record))
    }

    /// The stored row with its owned collections filled in from storage.
    pub fn load<T: Persistent>(&self, id: EntityId) -> IntegrityResult<Option<T>> {
        let index = self.lock_index();
        let Some(root) = self.backend.find(id)?.filter(|r| r.kind() == T::KIND) else {
            return Ok(None);
        };

        let mut graph = Graph::rooted(root);
        let mut position = 0;
        while let Some(node) = graph.node(position) {
            let kind = node.record.kind();
            let owner = node.id()?;
            for def in self.schema.owned_by(kind).filter(|def| def.embedded) {
                for child in index.children(def.relation, owner) {
                    if let Some(record) = self.backend.find(child)? {
                        graph.push(record, position, def.relation);
                    }
                }
            }
            position += 1;
        }
        drop(index);

        for node in graph.nodes_mut() {
            node.record.set_hydrated(true);
        }
        Ok(T::from_record(graph.assemble()?))
    }

    pub fn exists(&self, id: EntityId) -> IntegrityResult<bool> {
        Ok(self.backend.find(id)?.is_some())
    }

    /// Rows on the child side of `relation` linked to `owner`.
    pub fn children(&self, relation: Relation, owner: EntityId) -> Vec<EntityId> {
        self.lock_index().children(relation, owner)
    }

    /// Rows on the owner side of `relation` linked to `child`.
    pub fn parents(&self, relation: Relation, child: EntityId) -> Vec<EntityId> {
        self.lock_index().parents(relation, child)
    }

    /// Employee holding a bank account.
    pub fn bank_account_holder(&self, account: EntityId) -> Option<EntityId> {
        self.parents(Relation::EmployeeBankAccount, account)
            .into_iter()
            .next()
    }

    pub fn breads_using(&self, ingredient: EntityId) -> Vec<EntityId> {
        self.parents(Relation::BreadIngredients, ingredient)
    }

    pub fn order_items_of_bread(&self, bread: EntityId) -> Vec<EntityId> {
        self.children(Relation::BreadOrderItems, bread)
    }

    pub fn order_items_of_batch(&self, batch: EntityId) -> Vec<EntityId> {
        self.children(Relation::BatchOrderItems, batch)
    }

    fn lock_index(&self) -> MutexGuard<'_, RelationIndex> {
        // The published index is only ever replaced whole, so a poisoned lock
        // still guards a consistent value.
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transact<R>(
        &self,
        op: &'static str,
        work: impl FnOnce(&mut dyn Transaction, &mut RelationIndex) -> IntegrityResult<R>,
    ) -> IntegrityResult<R> {
        let mut index = self.lock_index();
        let mut staged = index.clone();
        let mut tx = self.backend.begin()?;
        let tx_id = tx.id();

        match work(tx.as_mut(), &mut staged) {
            Ok(value) => {
                if let Err(err) = tx.commit() {
                    let err = IntegrityError::from(err);
                    warn!(tx = %tx_id, op, error = %err, "commit rejected, rolled back");
                    return Err(err);
                }
                *index = staged;
                info!(tx = %tx_id, op, "committed");
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                warn!(tx = %tx_id, op, error = %err, "rolled back");
                Err(err)
            }
        }
    }

    fn stored(tx: &dyn Transaction, kind: EntityKind, id: EntityId) -> IntegrityResult<Record> {
        tx.find(id)
            .filter(|record| record.kind() == kind)
            .ok_or_else(|| IntegrityError::not_found(kind.name(), id))
    }

    fn save_graph(
        &self,
        tx: &mut dyn Transaction,
        staged: &mut RelationIndex,
        root: Record,
    ) -> IntegrityResult<Graph> {
        let mut graph = Graph::flatten(root);

        for node in graph.nodes_mut() {
            match node.record.id() {
                Some(id) => node.stored = Some(Self::stored(tx, node.record.kind(), id)?),
                None => node.record.assign_identity(tx.allocate_id())?,
            }
        }
        self.link_graph(&mut graph, staged)?;
        let detached = self.detached_children(&mut graph, staged)?;

        for node in graph.nodes() {
            let violations = node.record.validate(&self.validator);
            if !violations.is_empty() {
                return Err(IntegrityError::validation(node.record.name(), violations));
            }
        }

        self.check_references(tx, staged, &graph)?;
        let replaced = self.replaced_children(&graph);
        debug!(
            rows = graph.len(),
            new = graph.nodes().iter().filter(|n| n.is_new()).count(),
            detached = detached.len(),
            replaced = replaced.len(),
            "cascade save plan"
        );

        for node in graph.nodes() {
            staged.upsert(&node.record);
            let mut row = node.record.clone();
            row.set_hydrated(false);
            if node.is_new() {
                tx.insert(row)?;
            } else {
                tx.update(row)?;
            }
        }
        for (kind, id) in detached.into_iter().chain(replaced) {
            self.delete_cascade(tx, staged, kind, id)?;
        }
        Ok(graph)
    }

    /// Point every embedded child at its owner (and, for keys held by the
    /// owner, the owner at the child), then derive back-references for rows
    /// saved on their own.
    fn link_graph(&self, graph: &mut Graph, staged: &RelationIndex) -> IntegrityResult<()> {
        for position in 0..graph.len() {
            let Some(node) = graph.node(position) else {
                continue;
            };
            let child_id = node.id()?;
            let Some((owner_pos, relation)) = node.parent else {
                self.adopt_back_references(graph, position, staged)?;
                continue;
            };
            let owner_id = graph
                .node(owner_pos)
                .ok_or_else(|| IntegrityError::invariant("graph owner missing"))?
                .id()?;

            if let Some(child) = graph.node_mut(position) {
                child.record.link(relation, owner_id).or_else(|err| match relation.def().fk_side {
                    FkSide::Owner => Ok(()),
                    FkSide::Child => Err(err),
                })?;
            }
            if relation.def().fk_side == FkSide::Owner {
                if let Some(owner) = graph.node_mut(owner_pos) {
                    owner.record.link(relation, child_id)?;
                }
            }
        }
        Ok(())
    }

    /// A row saved outside its owner's collection takes its back-references
    /// from the index, never from the caller.
    fn adopt_back_references(
        &self,
        graph: &mut Graph,
        position: usize,
        staged: &RelationIndex,
    ) -> IntegrityResult<()> {
        let Some(node) = graph.node_mut(position) else {
            return Ok(());
        };
        let id = node.id()?;
        let kind = node.record.kind();
        for def in self.schema.owners_of(kind).filter(|d| d.fk_side == FkSide::Owner && d.embedded) {
            if let Some(holder) = staged.parents(def.relation, id).into_iter().next() {
                node.record.link(def.relation, holder)?;
            }
        }
        Ok(())
    }

    fn check_references(
        &self,
        tx: &dyn Transaction,
        staged: &RelationIndex,
        graph: &Graph,
    ) -> IntegrityResult<()> {
        let in_graph: HashMap<EntityId, EntityKind> = graph
            .nodes()
            .iter()
            .filter_map(|n| n.record.id().map(|id| (id, n.record.kind())))
            .collect();
        let mut claimed: HashMap<(Relation, EntityId), EntityId> = HashMap::new();

        for node in graph.nodes() {
            let id = node.id()?;
            let record = &node.record;
            let kind = record.kind();

            for def in self.schema.owners_of(kind).filter(|def| def.required) {
                let held = match def.fk_side {
                    FkSide::Child => record.holds(def.relation),
                    FkSide::Owner => {
                        node.parent.is_some_and(|(_, r)| r == def.relation)
                            || !staged.parents(def.relation, id).is_empty()
                    }
                };
                if !held {
                    return Err(IntegrityError::referential(
                        kind.name(),
                        Some(id),
                        def.relation.name(),
                        format!("{kind} requires a {}", def.owner),
                    ));
                }
            }

            for fk in record.foreign_keys() {
                let expected = fk.target_kind();
                let found = in_graph
                    .get(&fk.target)
                    .copied()
                    .or_else(|| tx.find(fk.target).map(|r| r.kind()));
                match found {
                    Some(found) if found == expected => {}
                    Some(found) => {
                        return Err(IntegrityError::referential(
                            kind.name(),
                            Some(id),
                            fk.relation.name(),
                            format!("{} points at a {found}, expected a {expected}", fk.target),
                        ));
                    }
                    None => {
                        return Err(IntegrityError::referential(
                            kind.name(),
                            Some(id),
                            fk.relation.name(),
                            format!("references missing {expected} {}", fk.target),
                        ));
                    }
                }

                let def = fk.relation.def();
                if def.fk_side == FkSide::Owner && def.on_delete == OnDelete::Cascade {
                    let rival = claimed
                        .insert((fk.relation, fk.target), id)
                        .filter(|holder| *holder != id)
                        .or_else(|| {
                            staged
                                .parents(fk.relation, fk.target)
                                .into_iter()
                                .find(|holder| *holder != id)
                        });
                    if let Some(rival) = rival {
                        return Err(IntegrityError::referential(
                            kind.name(),
                            Some(id),
                            fk.relation.name(),
                            format!("{expected} {} already belongs to {kind} {rival}", fk.target),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Stored children a hydrated owner no longer carries in its embedded
    /// collections. A row still anywhere in the graph (moved to another
    /// owner) is kept.
    ///
    /// Child-held keys are returned for deletion. A key the owner holds itself
    /// is cleared on the owner, which hands the child to
    /// [`Self::replaced_children`].
    fn detached_children(
        &self,
        graph: &mut Graph,
        staged: &RelationIndex,
    ) -> IntegrityResult<Vec<(EntityKind, EntityId)>> {
        let in_graph: HashSet<EntityId> = graph.nodes().iter().filter_map(|n| n.record.id()).collect();
        let mut detached = Vec::new();

        for position in 0..graph.len() {
            let Some(node) = graph.node(position) else {
                continue;
            };
            if node.is_new() || !node.record.is_hydrated() {
                continue;
            }
            let owner = node.id()?;
            let mut unlinked = Vec::new();
            for def in self
                .schema
                .owned_by(node.record.kind())
                .filter(|def| def.embedded && def.orphan_removal)
            {
                for child in staged.children(def.relation, owner) {
                    if in_graph.contains(&child) {
                        continue;
                    }
                    match def.fk_side {
                        FkSide::Child => detached.push((def.child, child)),
                        FkSide::Owner => unlinked.push((def.relation, child)),
                    }
                }
            }
            if let Some(node) = graph.node_mut(position) {
                for (relation, child) in unlinked {
                    node.record.unlink(relation, child);
                }
            }
        }
        Ok(detached)
    }

    /// Owned children a save displaces: keys held by an existing owner that
    /// now point somewhere else.
    fn replaced_children(&self, graph: &Graph) -> Vec<(EntityKind, EntityId)> {
        let mut replaced = Vec::new();
        for node in graph.nodes() {
            let Some(stored) = &node.stored else {
                continue;
            };
            let owned = self
                .schema
                .owned_by(node.record.kind())
                .filter(|def| def.fk_side == FkSide::Owner && def.orphan_removal);
            for def in owned {
                let before = stored
                    .foreign_keys()
                    .into_iter()
                    .find(|fk| fk.relation == def.relation);
                let after = node
                    .record
                    .foreign_keys()
                    .into_iter()
                    .find(|fk| fk.relation == def.relation);
                if let Some(before) = before {
                    if after.map(|fk| fk.target) != Some(before.target) {
                        replaced.push((def.child, before.target));
                    }
                }
            }
        }
        replaced
    }

    /// Delete `id` and everything it owns through cascade relations,
    /// children before parents. Fails if a row outside that set still holds a
    /// key into it.
    fn delete_cascade(
        &self,
        tx: &mut dyn Transaction,
        staged: &mut RelationIndex,
        kind: EntityKind,
        id: EntityId,
    ) -> IntegrityResult<usize> {
        let mut closure: BTreeMap<EntityId, EntityKind> = BTreeMap::new();
        let mut queue = VecDeque::from([(kind, id)]);
        while let Some((kind, id)) = queue.pop_front() {
            if closure.insert(id, kind).is_some() {
                continue;
            }
            for def in self
                .schema
                .owned_by(kind)
                .filter(|def| def.on_delete == OnDelete::Cascade)
            {
                for child in staged.children(def.relation, id) {
                    queue.push_back((def.child, child));
                }
            }
        }

        for (&member, &member_kind) in &closure {
            let holders = self
                .schema
                .owned_by(member_kind)
                .filter(|def| def.fk_side == FkSide::Child)
                .flat_map(|def| {
                    staged
                        .children(def.relation, member)
                        .into_iter()
                        .map(move |h| (def.relation, def.child, h))
                })
                .chain(
                    self.schema
                        .owners_of(member_kind)
                        .filter(|def| def.fk_side == FkSide::Owner)
                        .flat_map(|def| {
                            staged
                                .parents(def.relation, member)
                                .into_iter()
                                .map(move |h| (def.relation, def.owner, h))
                        }),
                );
            for (relation, holder_kind, holder) in holders {
                if !closure.contains_key(&holder) {
                    return Err(IntegrityError::referential(
                        member_kind.name(),
                        Some(member),
                        relation.name(),
                        format!("still referenced by {holder_kind} {holder}"),
                    ));
                }
            }
        }

        let mut ordered: Vec<(EntityKind, EntityId)> =
            closure.into_iter().map(|(id, kind)| (kind, id)).collect();
        ordered.sort_by_key(|(kind, id)| (Reverse(self.schema.rank(*kind)), Reverse(*id)));
        debug!(root = %id, root_kind = %kind, rows = ordered.len(), "cascade delete plan");

        for (kind, id) in &ordered {
            tx.delete(*kind, *id)?;
            staged.remove(*id);
        }
        Ok(ordered.len())
    }
}
