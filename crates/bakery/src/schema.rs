//! Static relationship schema.
//!
//! One table per entity, one foreign key per relationship, and a join table
//! for Bread↔Ingredient. The schema is the single source of truth for cascade
//! and orphan behaviour: the integrity engine never walks the object graph to
//! discover it.

use serde::{Deserialize, Serialize};

use bakehouse_core::{IntegrityError, IntegrityResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bakery,
    Employee,
    BankAccount,
    Task,
    ProductionBatch,
    Bread,
    Ingredient,
    Order,
    OrderItem,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Bakery,
        EntityKind::Employee,
        EntityKind::BankAccount,
        EntityKind::Task,
        EntityKind::ProductionBatch,
        EntityKind::Bread,
        EntityKind::Ingredient,
        EntityKind::Order,
        EntityKind::OrderItem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Bakery => "Bakery",
            EntityKind::Employee => "Employee",
            EntityKind::BankAccount => "BankAccount",
            EntityKind::Task => "Task",
            EntityKind::ProductionBatch => "ProductionBatch",
            EntityKind::Bread => "Bread",
            EntityKind::Ingredient => "Ingredient",
            EntityKind::Order => "Order",
            EntityKind::OrderItem => "OrderItem",
        }
    }

    fn position(self) -> usize {
        EntityKind::ALL
            .iter()
            .position(|k| *k == self)
            .unwrap_or(EntityKind::ALL.len())
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    BakeryEmployees,
    BakeryBatches,
    EmployeeTasks,
    EmployeeBankAccount,
    BatchOrderItems,
    BreadOrderItems,
    OrderItems,
    BreadIngredients,
}

impl Relation {
    pub fn name(self) -> &'static str {
        match self {
            Relation::BakeryEmployees => "bakery_employees",
            Relation::BakeryBatches => "bakery_batches",
            Relation::EmployeeTasks => "employee_tasks",
            Relation::EmployeeBankAccount => "employee_bank_account",
            Relation::BatchOrderItems => "batch_order_items",
            Relation::BreadOrderItems => "bread_order_items",
            Relation::OrderItems => "order_items",
            Relation::BreadIngredients => "bread_ingredients",
        }
    }

    pub fn def(self) -> &'static RelationDef {
        // RELATIONS is declared in enum order.
        &RELATIONS[self as usize]
    }
}

impl core::fmt::Display for Relation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which table holds the foreign key of a relationship.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FkSide {
    /// The child row points at its owner (classic one-to-many).
    Child,
    /// The owner row points at the child (Employee → BankAccount, Bread → Ingredient join rows).
    Owner,
}

/// What deleting the owner does to the other side.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete the children too.
    Cascade,
    /// Drop the link rows only; the other side survives.
    Unlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub relation: Relation,
    pub owner: EntityKind,
    pub child: EntityKind,
    pub fk_side: FkSide,
    pub on_delete: OnDelete,
    /// Detaching a child from the owner's collection deletes the child.
    pub orphan_removal: bool,
    /// Every child row must be linked to an owner.
    pub required: bool,
    /// The owner carries these children inline (cascade-save and `load` hydrate them).
    pub embedded: bool,
}

pub static RELATIONS: [RelationDef; 8] = [
    RelationDef {
        relation: Relation::BakeryEmployees,
        owner: EntityKind::Bakery,
        child: EntityKind::Employee,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: true,
    },
    RelationDef {
        relation: Relation::BakeryBatches,
        owner: EntityKind::Bakery,
        child: EntityKind::ProductionBatch,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: true,
    },
    RelationDef {
        relation: Relation::EmployeeTasks,
        owner: EntityKind::Employee,
        child: EntityKind::Task,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: true,
    },
    RelationDef {
        relation: Relation::EmployeeBankAccount,
        owner: EntityKind::Employee,
        child: EntityKind::BankAccount,
        fk_side: FkSide::Owner,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: true,
    },
    RelationDef {
        relation: Relation::BatchOrderItems,
        owner: EntityKind::ProductionBatch,
        child: EntityKind::OrderItem,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: false,
        embedded: false,
    },
    RelationDef {
        relation: Relation::BreadOrderItems,
        owner: EntityKind::Bread,
        child: EntityKind::OrderItem,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: false,
    },
    RelationDef {
        relation: Relation::OrderItems,
        owner: EntityKind::Order,
        child: EntityKind::OrderItem,
        fk_side: FkSide::Child,
        on_delete: OnDelete::Cascade,
        orphan_removal: true,
        required: true,
        embedded: true,
    },
    RelationDef {
        relation: Relation::BreadIngredients,
        owner: EntityKind::Bread,
        child: EntityKind::Ingredient,
        fk_side: FkSide::Owner,
        on_delete: OnDelete::Unlink,
        orphan_removal: false,
        required: false,
        embedded: false,
    },
];

/// Relationship table plus the dependency order derived from it.
///
/// `save_order` lists owners before what they own; for link-only edges the
/// linked side comes before the side holding the join rows. Deletes walk the
/// same list backwards, so children always go before their parents.
#[derive(Debug, Clone)]
pub struct Schema {
    relations: &'static [RelationDef],
    order: Vec<EntityKind>,
}

impl Schema {
    /// The bakery schema.
    pub fn standard() -> IntegrityResult<Self> {
        Self::from_relations(&RELATIONS)
    }

    /// Build a schema, computing the dependency order once (Kahn's algorithm,
    /// ties broken by declaration order). Fails on a dependency cycle.
    pub fn from_relations(relations: &'static [RelationDef]) -> IntegrityResult<Self> {
        let n = EntityKind::ALL.len();
        let mut indegree = vec![0usize; n];
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];

        for def in relations {
            let (from, to) = match def.on_delete {
                OnDelete::Cascade => (def.owner, def.child),
                OnDelete::Unlink => (def.child, def.owner),
            };
            edges[from.position()].push(to.position());
            indegree[to.position()] += 1;
        }

        let mut order = Vec::with_capacity(n);
        let mut done = vec![false; n];
        while order.len() < n {
            let next = (0..n).find(|i| !done[*i] && indegree[*i] == 0);
            let Some(i) = next else {
                let stuck: Vec<&str> = (0..n)
                    .filter(|i| !done[*i])
                    .map(|i| EntityKind::ALL[i].name())
                    .collect();
                return Err(IntegrityError::invariant(format!(
                    "relationship schema has a dependency cycle among {}",
                    stuck.join(", ")
                )));
            };
            done[i] = true;
            order.push(EntityKind::ALL[i]);
            for j in &edges[i] {
                indegree[*j] -= 1;
            }
        }

        Ok(Self { relations, order })
    }

    pub fn relations(&self) -> &'static [RelationDef] {
        self.relations
    }

    pub fn relation(&self, relation: Relation) -> IntegrityResult<&'static RelationDef> {
        self.relations
            .iter()
            .find(|def| def.relation == relation)
            .ok_or_else(|| IntegrityError::invariant(format!("unknown relation {relation}")))
    }

    /// Relations in which `kind` is the owner.
    pub fn owned_by(&self, kind: EntityKind) -> impl Iterator<Item = &'static RelationDef> {
        self.relations.iter().filter(move |def| def.owner == kind)
    }

    /// Relations in which `kind` is the child.
    pub fn owners_of(&self, kind: EntityKind) -> impl Iterator<Item = &'static RelationDef> {
        self.relations.iter().filter(move |def| def.child == kind)
    }

    /// Owners before owned.
    pub fn save_order(&self) -> &[EntityKind] {
        &self.order
    }

    /// Leaves before parents.
    pub fn delete_order(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.order.iter().rev().copied()
    }

    /// Position in `save_order`; higher ranks are deleted first.
    pub fn rank(&self, kind: EntityKind) -> usize {
        self.order
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.order.len())
    }
}
