//! Bakery: the root owner of staff and production.

use serde::{Deserialize, Serialize};

use bakehouse_core::Identity;
use bakehouse_validation::{CNPJ_CHECKSUM, Field, POSTAL_REGION, Pattern, Validate};

use crate::production::ProductionBatch;
use crate::staff::Employee;

static POSTAL_CODE: Pattern = Pattern::new(r"\d{5}-\d{3}");
static TAX_ID: Pattern = Pattern::new(r"[0-9]+(-[0-9]+)*");

/// A bakery of the chain.
///
/// `tax_id` is globally unique. `employees` and `batches` are the owned
/// collections cascaded by a save. After a plain `find` they are empty and the
/// engine's relation views are authoritative; after `load` or `save` they are
/// complete, and a child taken out of them is deleted by the next save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bakery {
    pub(crate) identity: Identity,
    pub name: String,
    pub postal_code: Option<String>,
    pub tax_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employees: Vec<Employee>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<ProductionBatch>,
    /// Set by `load` and `save` when the owned collections mirror storage.
    #[serde(skip)]
    pub(crate) hydrated: bool,
}

impl_entity!(Bakery);

impl Bakery {
    pub fn new(name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tax_id: tax_id.into(),
            ..Self::default()
        }
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn hire(&mut self, employee: Employee) {
        self.employees.push(employee);
    }

    pub fn schedule(&mut self, batch: ProductionBatch) {
        self.batches.push(batch);
    }
}

impl Validate for Bakery {
    fn entity_name(&self) -> &'static str {
        "Bakery"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", Some(self.name.as_str())).required().max_len(255),
            Field::text("postal_code", self.postal_code.as_deref())
                .length(9, 9)
                .pattern(&POSTAL_CODE)
                .predicate(POSTAL_REGION),
            Field::text("tax_id", Some(self.tax_id.as_str()))
                .required()
                .length(14, 18)
                .pattern(&TAX_ID)
                .predicate(CNPJ_CHECKSUM),
        ]
    }
}
