//! Cart Aggregate
//!
//! [`CartStore`] is the single source of truth for one browsing session's
//! cart. Every mutation except [`CartStore::toggle_cart`] recomputes the
//! derived totals and writes the whole state through the injected
//! [`CartStorage`] port under [`CART_STORAGE_KEY`].
//!
//! No operation fails: bad input is normalized (negative quantities become
//! zero, unknown ids are ignored) and items at zero are dropped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PricingPolicy;
use crate::domain::aggregates::discount::{AppliedDiscount, DiscountKind, DiscountQuote};
use crate::domain::aggregates::product::{Product, ProductVariant};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Money;
use crate::storage::CartStorage;

/// Well-known key the whole cart state is persisted under.
pub const CART_STORAGE_KEY: &str = "lapesqueria-cart";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_sku: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub variant_sku: Option<String>,
    #[serde(alias = "price")]
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(alias = "stock")]
    pub available_stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub conservation_donation_percentage: Option<Decimal>,
    #[serde(default)]
    pub conservation_focus: Option<String>,
}

impl CartLineItem {
    /// Snapshot of the product (and variant) at add-time.
    pub fn snapshot(product: &Product, variant: Option<&ProductVariant>, quantity: u32) -> Self {
        let conservation = product.conservation_info.as_ref();
        Self {
            id: product.line_item_id(variant),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            product_sku: product.sku.clone(),
            variant_id: variant.and_then(ProductVariant::id).map(str::to_string),
            variant_name: variant.map(|v| v.variant_name.clone()),
            variant_sku: variant.map(|v| v.sku.clone()),
            unit_price: product.unit_price(variant),
            quantity,
            available_stock: product.available_stock(variant),
            image_url: product.image_url(variant),
            conservation_donation_percentage: conservation.and_then(|c| c.donation_percentage),
            conservation_focus: conservation.and_then(|c| c.conservation_focus.clone()),
        }
    }

    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
    pub fn at_stock_limit(&self) -> bool { self.quantity >= self.available_stock }
}

/// Derived totals. Never mutated on their own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CartTotals {
    pub fn compute(items: &[CartLineItem], discount: Option<&AppliedDiscount>, policy: &PricingPolicy) -> Self {
        let subtotal = items.iter().fold(Money::ZERO, |acc, i| acc + i.line_total());
        let discount_amount = discount.map_or(Money::ZERO, |d| d.kind.cart_amount(subtotal, d.value));
        let discounted = (subtotal - discount_amount).floor_zero();

        let free_shipping = subtotal > policy.free_shipping_threshold
            || discount.is_some_and(|d| d.kind.waives_shipping());
        let shipping = if free_shipping { Money::ZERO } else { policy.flat_shipping_fee };

        let tax = discounted.scale(policy.tax_rate);
        Self { subtotal, discount_amount, shipping, tax, total: discounted + shipping + tax }
    }
}

/// Everything that gets persisted, as one blob.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    #[serde(default)]
    pub items: Vec<CartLineItem>,
    #[serde(flatten)]
    pub totals: CartTotals,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub discount: Option<AppliedDiscount>,
}

pub struct CartStore<S> {
    state: CartState,
    storage: S,
    policy: PricingPolicy,
    events: Vec<CartEvent>,
}

impl<S: CartStorage> CartStore<S> {
    /// Restores the saved cart if there is one. Saved totals are trusted as-is.
    pub fn open(storage: S, policy: PricingPolicy) -> Self {
        let state = match storage.read(CART_STORAGE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<CartState>(&blob) {
                Ok(state) => {
                    debug!(items = state.items.len(), "cart restored");
                    state
                }
                Err(e) => {
                    warn!(error = %e, "failed to load saved cart, starting empty");
                    CartState::default()
                }
            },
            Ok(None) => CartState::default(),
            Err(e) => {
                warn!(error = %e, "failed to read saved cart, starting empty");
                CartState::default()
            }
        };
        Self { state, storage, policy, events: vec![] }
    }

    pub fn state(&self) -> &CartState { &self.state }
    pub fn items(&self) -> &[CartLineItem] { &self.state.items }
    pub fn totals(&self) -> &CartTotals { &self.state.totals }
    pub fn discount(&self) -> Option<&AppliedDiscount> { self.state.discount.as_ref() }
    pub fn policy(&self) -> &PricingPolicy { &self.policy }
    pub fn storage(&self) -> &S { &self.storage }
    pub fn is_open(&self) -> bool { self.state.is_open }
    pub fn is_empty(&self) -> bool { self.state.items.is_empty() }

    /// Closed, with no lines, no discount and no guest details.
    pub fn is_blank(&self) -> bool {
        let s = &self.state;
        s.items.is_empty() && s.discount.is_none() && s.guest_email.is_none() && s.guest_name.is_none() && !s.is_open
    }
    pub fn item(&self, id: &str) -> Option<&CartLineItem> { self.state.items.iter().find(|i| i.id == id) }

    /// Total units across all line items.
    pub fn item_count(&self) -> u32 { self.state.items.iter().map(|i| i.quantity).sum() }

    /// Merges into an existing line by identity, otherwise appends a new line.
    /// Stock is not enforced here.
    pub fn add_item(&mut self, product: &Product, variant: Option<&ProductVariant>, quantity: u32) {
        if quantity == 0 {
            debug!(product_id = %product.id, "ignoring add of zero units");
            return;
        }
        let id = product.line_item_id(variant);
        let unit_price = match self.state.items.iter().position(|i| i.id == id) {
            Some(pos) => {
                let existing = &mut self.state.items[pos];
                existing.quantity = existing.quantity.saturating_add(quantity);
                existing.unit_price
            }
            None => {
                let item = CartLineItem::snapshot(product, variant, quantity);
                let price = item.unit_price;
                self.state.items.push(item);
                price
            }
        };
        debug!(item_id = %id, quantity, "item added");
        self.events.push(CartEvent::ItemAdded {
            item_id: id,
            product_id: product.id.clone(),
            variant_id: variant.and_then(ProductVariant::id).map(str::to_string),
            unit_price,
            quantity,
        });
        self.commit();
    }

    pub fn remove_item(&mut self, id: &str) {
        if let Some(pos) = self.state.items.iter().position(|i| i.id == id) {
            let item = self.state.items.remove(pos);
            self.raise_removed(item);
        }
        self.commit();
    }

    /// Negative quantities count as zero, and zero removes the line.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        if let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) {
            item.quantity = quantity;
        }
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.state.items).into_iter().partition(|i| i.quantity > 0);
        self.state.items = kept;
        for item in dropped { self.raise_removed(item); }
        self.commit();
    }

    /// One more unit, unless the line is already at its stock ceiling.
    pub fn increment_item(&mut self, id: &str) -> bool {
        let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) else { return false };
        if item.at_stock_limit() {
            debug!(item_id = %id, stock = item.available_stock, "increment refused at stock limit");
            return false;
        }
        item.quantity += 1;
        self.commit();
        true
    }

    /// One less unit, never below one. Use `remove_item` to drop the line.
    pub fn decrement_item(&mut self, id: &str) -> bool {
        let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) else { return false };
        if item.quantity <= 1 { return false; }
        item.quantity -= 1;
        self.commit();
        true
    }

    /// Empties items and discount and erases the saved cart.
    /// The open flag and guest info survive.
    pub fn clear_cart(&mut self) {
        let items = self.state.items.len();
        self.state.items.clear();
        self.state.discount = None;
        self.state.totals = CartTotals::default();
        if let Err(e) = self.storage.remove(CART_STORAGE_KEY) {
            warn!(error = %e, "failed to erase saved cart");
        }
        self.events.push(CartEvent::Cleared { items });
    }

    /// Replaces any current discount. The code is assumed to be validated already.
    pub fn apply_discount(&mut self, code: impl Into<String>, kind: DiscountKind, value: Decimal, description: Option<String>) {
        let code = code.into();
        self.events.push(CartEvent::DiscountApplied { code: code.clone(), kind });
        self.state.discount = Some(AppliedDiscount { code, kind, value, description, amount: Money::ZERO });
        self.commit();
    }

    pub fn apply_quote(&mut self, quote: &DiscountQuote) {
        self.apply_discount(quote.code.clone(), quote.kind, quote.value, Some(quote.description.clone()));
    }

    pub fn remove_discount(&mut self) {
        if let Some(previous) = self.state.discount.take() {
            self.events.push(CartEvent::DiscountRemoved { code: previous.code });
        }
        self.commit();
    }

    pub fn recalculate_totals(&mut self) { self.commit(); }

    /// Visibility only: nothing is recomputed or saved.
    pub fn toggle_cart(&mut self) { self.state.is_open = !self.state.is_open; }

    /// Absent or blank values keep what is already there.
    pub fn set_guest_info(&mut self, email: Option<&str>, name: Option<&str>) {
        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            self.state.guest_email = Some(email.to_string());
        }
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.state.guest_name = Some(name.to_string());
        }
        self.persist();
    }

    pub fn take_events(&mut self) -> Vec<CartEvent> { std::mem::take(&mut self.events) }

    fn raise_removed(&mut self, item: CartLineItem) {
        debug!(item_id = %item.id, "item removed");
        self.events.push(CartEvent::ItemRemoved {
            item_id: item.id,
            product_id: item.product_id,
            unit_price: item.unit_price,
            quantity: item.quantity,
        });
    }

    fn commit(&mut self) {
        let totals = CartTotals::compute(&self.state.items, self.state.discount.as_ref(), &self.policy);
        if let Some(discount) = self.state.discount.as_mut() {
            discount.amount = totals.discount_amount;
        }
        self.state.totals = totals;
        self.persist();
    }

    fn persist(&mut self) {
        let blob = match serde_json::to_string(&self.state) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "failed to serialize cart");
                return;
            }
        };
        if let Err(e) = self.storage.write(CART_STORAGE_KEY, &blob) {
            warn!(error = %e, "failed to persist cart");
        }
    }
}
