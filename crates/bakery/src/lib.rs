//! Bakery back-office domain model.
//!
//! Nine entities, the field rules each one declares, and the static
//! relationship schema the integrity engine enforces. Owning-side foreign keys
//! live on the entities; inverse collections are views computed by the engine.
//! Collections embedded in an owner (`Bakery::employees`, `Employee::tasks`,
//! `Employee::bank_account`, `Order::items`, ...) are the cascade set handed to
//! a save.

#[macro_use]
mod macros;

pub mod bakery;
pub mod orders;
pub mod production;
pub mod record;
pub mod schema;
pub mod staff;

pub use bakery::Bakery;
pub use orders::{Order, OrderItem};
pub use production::{Bread, Ingredient, ProductionBatch};
pub use record::{ForeignKey, Persistent, Record, UniqueKey};
pub use schema::{EntityKind, FkSide, OnDelete, Relation, RelationDef, Schema};
pub use staff::{BankAccount, Employee, Task};
