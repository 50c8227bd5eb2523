//! Infrastructure layer: persistence backend, relation index, integrity
//! engine and configuration.

pub mod backend;
pub mod config;
pub mod engine;
pub mod graph;
pub mod index;


pub use backend::{BackendError, InMemoryBackend, PersistenceBackend, Transaction};
pub use config::BakehouseConfig;
pub use engine::IntegrityEngine;
pub use index::RelationIndex;
