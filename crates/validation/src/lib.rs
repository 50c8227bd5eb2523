//! Validation Engine: declarative field rules checked before any write.
//!
//! Entities describe their fields through [`Validate`]; a [`ValidationEngine`]
//! evaluates every rule of every field and returns the complete list of
//! violations. Checking has no side effects and never fails.

pub mod config;
pub mod engine;
pub mod field;
pub mod predicate;

pub use config::ValidationConfig;
pub use engine::{Clock, ValidationEngine};
pub use field::{Field, FieldValue, Pattern, Rule, Validate};
pub use predicate::{
    CnpjChecksum, CpfChecksum, NoDigits, PostalRegion, Predicate, CNPJ_CHECKSUM, CPF_CHECKSUM,
    NO_DIGITS, POSTAL_REGION,
};
