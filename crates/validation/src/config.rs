//! Which pluggable predicates a validation engine registers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allowed first digits of a postal code.
    pub postal_regions: Vec<char>,
    /// Register the CPF/CNPJ check-digit predicates.
    pub tax_checksums: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            postal_regions: vec!['5'],
            tax_checksums: false,
        }
    }
}
