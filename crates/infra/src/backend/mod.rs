//! Persistence backend boundary.
//!
//! The integrity engine only talks to storage through these traits. The
//! in-memory implementation behaves like a relational store with deferred
//! foreign keys: unique keys are checked per write, foreign keys at commit.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryBackend;
pub use r#trait::{BackendError, PersistenceBackend, Transaction};
