//! Production: batches, breads and their ingredients.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakehouse_core::{Entity, EntityId, Identity};
use bakehouse_validation::{Field, NO_DIGITS, Validate};

/// One oven run of a bakery. Order items baked in it point here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub(crate) identity: Identity,
    pub bakery: Option<EntityId>,
    pub batch_date: Option<NaiveDate>,
    pub started_at: Option<NaiveTime>,
}

impl_entity!(ProductionBatch);

impl ProductionBatch {
    pub fn new(batch_date: NaiveDate, started_at: NaiveTime) -> Self {
        Self {
            batch_date: Some(batch_date),
            started_at: Some(started_at),
            ..Self::default()
        }
    }
}

impl Validate for ProductionBatch {
    fn entity_name(&self) -> &'static str {
        "ProductionBatch"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::date("batch_date", self.batch_date).required().past(),
            Field::time("started_at", self.started_at).required(),
        ]
    }
}

/// A bread on the menu.
///
/// Bread is the owning side of the Bread↔Ingredient link: `ingredients` are the
/// join rows. Deleting a bread drops those rows and never the ingredients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bread {
    pub(crate) identity: Identity,
    pub name: String,
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub ingredients: Vec<EntityId>,
}

impl_entity!(Bread);

impl Bread {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            ..Self::default()
        }
    }

    /// Link a persisted ingredient. Returns `false` for a transient ingredient
    /// or one already linked.
    pub fn add_ingredient(&mut self, ingredient: &Ingredient) -> bool {
        match ingredient.id() {
            Some(id) if !self.ingredients.contains(&id) => {
                self.ingredients.push(id);
                true
            }
            _ => false,
        }
    }

    pub fn remove_ingredient(&mut self, ingredient: EntityId) -> bool {
        let before = self.ingredients.len();
        self.ingredients.retain(|id| *id != ingredient);
        self.ingredients.len() != before
    }

    pub fn uses(&self, ingredient: EntityId) -> bool {
        self.ingredients.contains(&ingredient)
    }
}

impl Validate for Bread {
    fn entity_name(&self) -> &'static str {
        "Bread"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", Some(self.name.as_str())).required().max_len(100),
            Field::decimal("price", self.price).required().positive(),
            Field::bytes("image", self.image.as_deref()),
        ]
    }
}

/// Ingredient; `name` is globally unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ingredient {
    pub(crate) identity: Identity,
    pub name: String,
}

impl_entity!(Ingredient);

impl Ingredient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Validate for Ingredient {
    fn entity_name(&self) -> &'static str {
        "Ingredient"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", Some(self.name.as_str()))
                .required()
                .max_len(100)
                .predicate(NO_DIGITS),
        ]
    }
}
