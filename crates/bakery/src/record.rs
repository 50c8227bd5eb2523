//! Type-erased rows.
//!
//! The integrity engine and the persistence backend work on `Record`, one
//! variant per entity. `Persistent` converts between a concrete entity and its
//! record, and the record knows which foreign keys its row holds.

use serde::{Deserialize, Serialize};

use bakehouse_core::{Entity, EntityId, Identity, IntegrityError, IntegrityResult, Violations};
use bakehouse_validation::ValidationEngine;

use crate::schema::{EntityKind, FkSide, Relation};
use crate::{
    BankAccount, Bakery, Bread, Employee, Ingredient, Order, OrderItem, ProductionBatch, Task,
};

/// Implemented by every entity through `impl_entity!`.
pub trait Persistent: Entity + Clone + Sized {
    const KIND: EntityKind;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Option<Self>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Bakery(Bakery),
    Employee(Employee),
    BankAccount(BankAccount),
    Task(Task),
    ProductionBatch(ProductionBatch),
    Bread(Bread),
    Ingredient(Ingredient),
    Order(Order),
    OrderItem(OrderItem),
}

macro_rules! each_record {
    ($record:expr, $bind:ident => $body:expr) => {
        match $record {
            Record::Bakery($bind) => $body,
            Record::Employee($bind) => $body,
            Record::BankAccount($bind) => $body,
            Record::Task($bind) => $body,
            Record::ProductionBatch($bind) => $body,
            Record::Bread($bind) => $body,
            Record::Ingredient($bind) => $body,
            Record::Order($bind) => $body,
            Record::OrderItem($bind) => $body,
        }
    };
}

/// A foreign key held by a row: the relationship and the row it points at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub relation: Relation,
    pub target: EntityId,
}

impl ForeignKey {
    /// Kind of the referenced row.
    pub fn target_kind(&self) -> EntityKind {
        let def = self.relation.def();
        match def.fk_side {
            FkSide::Child => def.owner,
            FkSide::Owner => def.child,
        }
    }

    /// `(owner, child)` of the link, given the id of the row holding the key.
    pub fn endpoints(&self, holder: EntityId) -> (EntityId, EntityId) {
        match self.relation.def().fk_side {
            FkSide::Child => (self.target, holder),
            FkSide::Owner => (holder, self.target),
        }
    }
}

/// A value that must be unique among all rows of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub field: &'static str,
    pub value: String,
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Bakery(_) => EntityKind::Bakery,
            Record::Employee(_) => EntityKind::Employee,
            Record::BankAccount(_) => EntityKind::BankAccount,
            Record::Task(_) => EntityKind::Task,
            Record::ProductionBatch(_) => EntityKind::ProductionBatch,
            Record::Bread(_) => EntityKind::Bread,
            Record::Ingredient(_) => EntityKind::Ingredient,
            Record::Order(_) => EntityKind::Order,
            Record::OrderItem(_) => EntityKind::OrderItem,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn identity(&self) -> Identity {
        each_record!(self, r => r.identity)
    }

    pub fn id(&self) -> Option<EntityId> {
        self.identity().id()
    }

    pub fn assign_identity(&mut self, id: EntityId) -> IntegrityResult<()> {
        each_record!(self, r => r.identity.assign(id))
    }

    /// Whether this row's embedded collections mirror storage. Rows without
    /// embedded collections are never hydrated.
    pub fn is_hydrated(&self) -> bool {
        match self {
            Record::Bakery(b) => b.hydrated,
            Record::Employee(e) => e.hydrated,
            Record::Order(o) => o.hydrated,
            _ => false,
        }
    }

    pub fn set_hydrated(&mut self, hydrated: bool) {
        match self {
            Record::Bakery(b) => b.hydrated = hydrated,
            Record::Employee(e) => e.hydrated = hydrated,
            Record::Order(o) => o.hydrated = hydrated,
            _ => {}
        }
    }

    pub fn validate(&self, engine: &ValidationEngine) -> Violations {
        each_record!(self, r => engine.validate(r))
    }

    /// Foreign keys stored on this row. `BankAccount::employee` is a mirror of
    /// `Employee::bank_account_id` and is not reported.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let fk = |relation, target: Option<EntityId>| target.map(|target| ForeignKey { relation, target });
        match self {
            Record::Employee(e) => [
                fk(Relation::BakeryEmployees, e.bakery),
                fk(Relation::EmployeeBankAccount, e.bank_account_id),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Record::Task(t) => fk(Relation::EmployeeTasks, t.employee).into_iter().collect(),
            Record::ProductionBatch(b) => fk(Relation::BakeryBatches, b.bakery).into_iter().collect(),
            Record::OrderItem(i) => [
                fk(Relation::OrderItems, i.order),
                fk(Relation::BreadOrderItems, i.bread),
                fk(Relation::BatchOrderItems, i.batch),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Record::Bread(b) => b
                .ingredients
                .iter()
                .map(|id| ForeignKey {
                    relation: Relation::BreadIngredients,
                    target: *id,
                })
                .collect(),
            Record::Bakery(_) | Record::BankAccount(_) | Record::Ingredient(_) | Record::Order(_) => {
                Vec::new()
            }
        }
    }

    pub fn holds(&self, relation: Relation) -> bool {
        self.foreign_keys().iter().any(|fk| fk.relation == relation)
    }

    /// Point this row's key for `relation` at `target`.
    pub fn link(&mut self, relation: Relation, target: EntityId) -> IntegrityResult<()> {
        let slot = match (self, relation) {
            (Record::Employee(e), Relation::BakeryEmployees) => &mut e.bakery,
            (Record::Employee(e), Relation::EmployeeBankAccount) => &mut e.bank_account_id,
            (Record::BankAccount(a), Relation::EmployeeBankAccount) => &mut a.employee,
            (Record::Task(t), Relation::EmployeeTasks) => &mut t.employee,
            (Record::ProductionBatch(b), Relation::BakeryBatches) => &mut b.bakery,
            (Record::OrderItem(i), Relation::OrderItems) => &mut i.order,
            (Record::OrderItem(i), Relation::BreadOrderItems) => &mut i.bread,
            (Record::OrderItem(i), Relation::BatchOrderItems) => &mut i.batch,
            (Record::Bread(b), Relation::BreadIngredients) => {
                if !b.ingredients.contains(&target) {
                    b.ingredients.push(target);
                }
                return Ok(());
            }
            (record, relation) => {
                return Err(IntegrityError::invariant(format!(
                    "{} does not hold a key for {relation}",
                    record.name()
                )));
            }
        };
        *slot = Some(target);
        Ok(())
    }

    /// Clear this row's key for `relation` if it points at `target`.
    pub fn unlink(&mut self, relation: Relation, target: EntityId) -> bool {
        let slot = match (self, relation) {
            (Record::Employee(e), Relation::BakeryEmployees) => &mut e.bakery,
            (Record::Employee(e), Relation::EmployeeBankAccount) => &mut e.bank_account_id,
            (Record::BankAccount(a), Relation::EmployeeBankAccount) => &mut a.employee,
            (Record::Task(t), Relation::EmployeeTasks) => &mut t.employee,
            (Record::ProductionBatch(b), Relation::BakeryBatches) => &mut b.bakery,
            (Record::OrderItem(i), Relation::OrderItems) => &mut i.order,
            (Record::OrderItem(i), Relation::BreadOrderItems) => &mut i.bread,
            (Record::OrderItem(i), Relation::BatchOrderItems) => &mut i.batch,
            (Record::Bread(b), Relation::BreadIngredients) => return b.remove_ingredient(target),
            _ => return false,
        };
        if *slot == Some(target) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn unique_keys(&self) -> Vec<UniqueKey> {
        match self {
            Record::Bakery(b) => vec![UniqueKey {
                field: "tax_id",
                value: b.tax_id.clone(),
            }],
            Record::Ingredient(i) => vec![UniqueKey {
                field: "name",
                value: i.name.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Take the embedded children out of this record, leaving it shallow.
    pub fn detach_children(&mut self) -> Vec<(Relation, Record)> {
        fn tag<T: Persistent>(relation: Relation, children: Vec<T>) -> Vec<(Relation, Record)> {
            children
                .into_iter()
                .map(|child| (relation, child.into_record()))
                .collect()
        }

        match self {
            Record::Bakery(b) => {
                let mut children = tag(Relation::BakeryEmployees, std::mem::take(&mut b.employees));
                children.extend(tag(Relation::BakeryBatches, std::mem::take(&mut b.batches)));
                children
            }
            Record::Employee(e) => {
                let mut children = tag(Relation::EmployeeTasks, std::mem::take(&mut e.tasks));
                children.extend(tag(
                    Relation::EmployeeBankAccount,
                    e.bank_account.take().into_iter().collect(),
                ));
                children
            }
            Record::Order(o) => tag(Relation::OrderItems, std::mem::take(&mut o.items)),
            _ => Vec::new(),
        }
    }

    /// Put a child back into the embedded collection for `relation`.
    pub fn attach_child(&mut self, relation: Relation, child: Record) -> IntegrityResult<()> {
        match (self, relation, child) {
            (Record::Bakery(b), Relation::BakeryEmployees, Record::Employee(e)) => b.employees.push(e),
            (Record::Bakery(b), Relation::BakeryBatches, Record::ProductionBatch(p)) => b.batches.push(p),
            (Record::Employee(e), Relation::EmployeeTasks, Record::Task(t)) => e.tasks.push(t),
            (Record::Employee(e), Relation::EmployeeBankAccount, Record::BankAccount(a)) => {
                e.bank_account = Some(a)
            }
            (Record::Order(o), Relation::OrderItems, Record::OrderItem(i)) => o.items.push(i),
            (owner, relation, child) => {
                return Err(IntegrityError::invariant(format!(
                    "{} cannot embed {} through {relation}",
                    owner.name(),
                    child.name()
                )));
            }
        }
        Ok(())
    }

    /// Drop `child` from the in-memory collection for `relation`.
    pub fn remove_child(&mut self, relation: Relation, child: EntityId) -> bool {
        fn drop_from<T: Entity>(items: &mut Vec<T>, child: EntityId) -> bool {
            let before = items.len();
            items.retain(|item| item.id() != Some(child));
            items.len() != before
        }

        match (self, relation) {
            (Record::Bakery(b), Relation::BakeryEmployees) => drop_from(&mut b.employees, child),
            (Record::Bakery(b), Relation::BakeryBatches) => drop_from(&mut b.batches, child),
            (Record::Employee(e), Relation::EmployeeTasks) => drop_from(&mut e.tasks, child),
            (Record::Employee(e), Relation::EmployeeBankAccount) => {
                let held = e.bank_account_id == Some(child)
                    || e.bank_account.as_ref().and_then(|a| a.id()) == Some(child);
                if held {
                    e.bank_account = None;
                    e.bank_account_id = None;
                }
                held
            }
            (Record::Order(o), Relation::OrderItems) => drop_from(&mut o.items, child),
            (Record::Bread(b), Relation::BreadIngredients) => b.remove_ingredient(child),
            _ => false,
        }
    }

    pub fn into_entity<T: Persistent>(self) -> Option<T> {
        T::from_record(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn persisted<T: Persistent>(entity: T, id: u64) -> Record {
        let mut record = entity.into_record();
        record.assign_identity(EntityId::new(id)).unwrap();
        record
    }

    #[test]
    fn order_item_reports_every_key_it_holds() {
        let mut record = OrderItem::new(2, EntityId::new(10)).baked_in(EntityId::new(11)).into_record();
        record.link(Relation::OrderItems, EntityId::new(12)).unwrap();

        let mut keys = record.foreign_keys();
        keys.sort_by_key(|fk| fk.relation);
        assert_eq!(
            keys,
            vec![
                ForeignKey { relation: Relation::BatchOrderItems, target: EntityId::new(11) },
                ForeignKey { relation: Relation::BreadOrderItems, target: EntityId::new(10) },
                ForeignKey { relation: Relation::OrderItems, target: EntityId::new(12) },
            ]
        );
        assert_eq!(keys[0].target_kind(), EntityKind::ProductionBatch);
        assert_eq!(keys[0].endpoints(EntityId::new(99)), (EntityId::new(11), EntityId::new(99)));
    }

    #[test]
    fn bank_account_back_reference_is_not_a_key() {
        let mut account = BankAccount::new("Banco do Brasil", "1234-5", "99887-6").into_record();
        account.link(Relation::EmployeeBankAccount, EntityId::new(3)).unwrap();
        assert!(account.foreign_keys().is_empty());

        let Record::BankAccount(account) = account else { unreachable!() };
        assert_eq!(account.employee(), Some(EntityId::new(3)));
    }

    #[test]
    fn link_rejects_relations_the_row_does_not_hold() {
        let mut bakery = Bakery::new("Padaria Central", "05604099000154").into_record();
        let err = bakery.link(Relation::OrderItems, EntityId::new(1)).unwrap_err();
        assert!(matches!(err, IntegrityError::InvariantViolation(_)));
    }

    #[test]
    fn unlink_only_clears_a_matching_target() {
        let mut task = Task::default().into_record();
        task.link(Relation::EmployeeTasks, EntityId::new(5)).unwrap();
        assert!(!task.unlink(Relation::EmployeeTasks, EntityId::new(6)));
        assert!(task.unlink(Relation::EmployeeTasks, EntityId::new(5)));
        assert!(!task.holds(Relation::EmployeeTasks));
    }

    #[test]
    fn detach_leaves_a_shallow_owner() {
        let mut employee = Employee::new("Maria", "padeira");
        employee.assign(Task::default());
        employee.set_bank_account(BankAccount::new("Caixa", "0001", "123-4"));
        let mut bakery = Bakery::new("Padaria Central", "05604099000154");
        bakery.hire(employee);
        let mut record = bakery.into_record();

        let children = record.detach_children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, Relation::BakeryEmployees);

        let Record::Bakery(shallow) = &record else { unreachable!() };
        assert!(shallow.employees.is_empty());

        let mut employee = children.into_iter().next().unwrap().1;
        let grandchildren = employee.detach_children();
        let relations: Vec<_> = grandchildren.iter().map(|(r, _)| *r).collect();
        assert_eq!(relations, vec![Relation::EmployeeTasks, Relation::EmployeeBankAccount]);
    }

    #[test]
    fn attach_and_remove_child_round_out_the_collection() {
        let mut order = persisted(Order::new(Decimal::ONE, chrono::Utc::now()), 1);
        let item = persisted(OrderItem::new(1, EntityId::new(2)), 3);
        order.attach_child(Relation::OrderItems, item).unwrap();

        let err = order
            .attach_child(Relation::OrderItems, Ingredient::new("Sal").into_record())
            .unwrap_err();
        assert!(matches!(err, IntegrityError::InvariantViolation(_)));

        assert!(order.remove_child(Relation::OrderItems, EntityId::new(3)));
        assert!(!order.remove_child(Relation::OrderItems, EntityId::new(3)));
    }

    #[test]
    fn unique_keys_cover_tax_id_and_ingredient_name() {
        let bakery = Bakery::new("Padaria", "05604099000154").into_record();
        assert_eq!(bakery.unique_keys()[0].field, "tax_id");
        assert_eq!(Ingredient::new("Sal").into_record().unique_keys()[0].value, "Sal");
        assert!(Bread::new("Baguete", Decimal::ONE).into_record().unique_keys().is_empty());
    }

    #[test]
    fn records_serialize_with_a_kind_tag() {
        let record = persisted(Ingredient::new("Fermento"), 7);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "ingredient");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), Some(EntityId::new(7)));
        assert_eq!(back.into_entity::<Ingredient>().map(|i| i.name), Some("Fermento".to_string()));
    }

    #[test]
    fn hydration_is_tracked_on_owners_only_and_never_serialized() {
        let mut order = persisted(Order::new(Decimal::ONE, chrono::Utc::now()), 4);
        order.set_hydrated(true);
        assert!(order.is_hydrated());
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("hydrated").is_none());
        let back: Record = serde_json::from_value(json).unwrap();
        assert!(!back.is_hydrated());

        let mut salt = Ingredient::new("Sal").into_record();
        salt.set_hydrated(true);
        assert!(!salt.is_hydrated());
    }
}
