//! Customer orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakehouse_core::{EntityId, Identity};
use bakehouse_validation::{Field, Validate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    pub(crate) identity: Identity,
    pub total: Option<Decimal>,
    pub ordered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    /// Set by `load` and `save` when the owned collections mirror storage.
    #[serde(skip)]
    pub(crate) hydrated: bool,
}

impl_entity!(Order);

impl Order {
    pub fn new(total: Decimal, ordered_at: DateTime<Utc>) -> Self {
        Self {
            total: Some(total),
            ordered_at: Some(ordered_at),
            ..Self::default()
        }
    }

    pub fn add_item(&mut self, item: OrderItem) {
        self.items.push(item);
    }
}

impl Validate for Order {
    fn entity_name(&self) -> &'static str {
        "Order"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::decimal("total", self.total).required().positive_or_zero(),
            Field::timestamp("ordered_at", self.ordered_at).required().past_or_present(),
        ]
    }
}

/// A line of an order.
///
/// Belongs to exactly one order and one bread, optionally to the batch it was
/// baked in. Missing order/bread links are referential failures raised by the
/// engine, not field violations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItem {
    pub(crate) identity: Identity,
    pub quantity: u32,
    pub order: Option<EntityId>,
    pub bread: Option<EntityId>,
    pub batch: Option<EntityId>,
}

impl_entity!(OrderItem);

impl OrderItem {
    pub fn new(quantity: u32, bread: EntityId) -> Self {
        Self {
            quantity,
            bread: Some(bread),
            ..Self::default()
        }
    }

    pub fn baked_in(mut self, batch: EntityId) -> Self {
        self.batch = Some(batch);
        self
    }
}

impl Validate for OrderItem {
    fn entity_name(&self) -> &'static str {
        "OrderItem"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::integer("quantity", Some(i64::from(self.quantity)))
                .required()
                .min(Decimal::ONE),
        ]
    }
}
