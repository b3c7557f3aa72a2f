//! Domain events
use serde::Serialize;

use crate::domain::aggregates::discount::DiscountKind;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { item_id: String, product_id: String, variant_id: Option<String>, unit_price: Money, quantity: u32 },
    ItemRemoved { item_id: String, product_id: String, unit_price: Money, quantity: u32 },
    DiscountApplied { code: String, kind: DiscountKind },
    DiscountRemoved { code: String },
    Cleared { items: usize },
}

impl CartEvent {
    /// Subject suffix used when the event is published.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "item_added",
            Self::ItemRemoved { .. } => "item_removed",
            Self::DiscountApplied { .. } => "discount_applied",
            Self::DiscountRemoved { .. } => "discount_removed",
            Self::Cleared { .. } => "cleared",
        }
    }
}
