//! `bakehouse-core`: identity and error building blocks.
//!
//! This crate contains **pure domain** primitives (no storage concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod violation;

pub use entity::Entity;
pub use error::{IntegrityError, IntegrityResult};
pub use id::{EntityId, Identity};
pub use violation::{ConstraintViolation, RuleKind, Violations};
