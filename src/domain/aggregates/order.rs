//! Checkout snapshot
//!
//! What the checkout flow reads off a cart to build an order. The cart never
//! calls checkout itself; it only hands this out.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::cart::{CartLineItem, CartState, CartStore};
use crate::domain::value_objects::Money;
use crate::storage::CartStorage;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub price: Money,
    pub name: String,
    pub variant_name: Option<String>,
    pub sku: String,
}

impl From<&CartLineItem> for OrderLine {
    fn from(item: &CartLineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            quantity: item.quantity,
            price: item.unit_price,
            name: item.product_name.clone(),
            variant_name: item.variant_name.clone(),
            sku: item.variant_sku.clone().unwrap_or_else(|| item.product_sku.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub discount_code: Option<String>,
    pub discount_amount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
}

impl CheckoutSnapshot {
    pub fn from_state(state: &CartState) -> Self {
        Self {
            lines: state.items.iter().map(OrderLine::from).collect(),
            subtotal: state.totals.subtotal,
            discount_code: state.discount.as_ref().map(|d| d.code.clone()),
            discount_amount: state.discount.as_ref().map_or(state.totals.discount_amount, |d| d.amount),
            shipping: state.totals.shipping,
            tax: state.totals.tax,
            total: state.totals.total,
            guest_email: state.guest_email.clone(),
            guest_name: state.guest_name.clone(),
        }
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
}

impl<S: CartStorage> CartStore<S> {
    pub fn checkout_snapshot(&self) -> CheckoutSnapshot { CheckoutSnapshot::from_state(self.state()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingPolicy;
    use crate::domain::aggregates::discount::DiscountKind;
    use crate::domain::aggregates::product::{Product, ProductVariant};
    use crate::storage::MemoryStorage;
    use rust_decimal::Decimal;

    #[test]
    fn test_snapshot_reflects_cart() {
        let mut cart = CartStore::open(MemoryStorage::new(), PricingPolicy::default());
        let hat = Product::new("5", "Sun Hat", "HAT-5", Money::from_cents(2500));
        let tee = Product::new("12", "Redfish Tee", "TEE-12", Money::from_cents(3000));
        let large = ProductVariant::new("tee-12-l", "Large", "TEE-12-L", Money::from_cents(3200), 8);
        cart.add_item(&hat, None, 1);
        cart.add_item(&tee, Some(&large), 2);
        cart.apply_discount("SUMMER10", DiscountKind::Percentage, Decimal::from(10), None);
        cart.set_guest_info(Some("angler@example.com"), Some("Marisol"));

        let snapshot = cart.checkout_snapshot();
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.lines[0].sku, "HAT-5");
        assert_eq!(snapshot.lines[1].sku, "TEE-12-L");
        assert_eq!(snapshot.lines[1].variant_name.as_deref(), Some("Large"));
        assert_eq!(snapshot.lines[1].price, Money::from_cents(3200));
        assert_eq!(snapshot.subtotal, Money::from_cents(8900));
        assert_eq!(snapshot.discount_code.as_deref(), Some("SUMMER10"));
        assert_eq!(snapshot.discount_amount, Money::from_cents(890));
        assert_eq!(snapshot.total, cart.totals().total);
        assert_eq!(snapshot.guest_name.as_deref(), Some("Marisol"));
    }

    #[test]
    fn test_snapshot_uses_discount_amount_from_storefront_blob() {
        let blob = r#"{
            "items": [{"id": "product-5", "productId": "5", "productName": "Sun Hat",
                       "productSku": "HAT-5", "price": 25, "quantity": 4, "stock": 999}],
            "subtotal": 100, "shipping": 0, "tax": 7.425, "total": 97.425, "isOpen": false,
            "discount": {"code": "SUMMER10", "type": "PERCENTAGE", "value": 10, "amount": 10}
        }"#;
        let storage = MemoryStorage::new().with_entry(crate::domain::aggregates::CART_STORAGE_KEY, blob);
        let cart = CartStore::open(storage, PricingPolicy::default());
        assert!(cart.totals().discount_amount.is_zero());
        assert_eq!(cart.checkout_snapshot().discount_amount, Money::from_cents(1000));
    }

    #[test]
    fn test_empty_cart_snapshot() {
        let cart = CartStore::open(MemoryStorage::new(), PricingPolicy::default());
        let snapshot = cart.checkout_snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.total.is_zero());
    }
}
