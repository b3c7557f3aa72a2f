//! Aggregates module
pub mod product;
pub mod discount;
pub mod order;
pub mod cart;

pub use product::{Product, ProductVariant, ProductImage, ConservationInfo};
pub use discount::{AppliedDiscount, DiscountBook, DiscountCode, DiscountKind, DiscountQuote, DiscountRejection};
pub use order::{CheckoutSnapshot, OrderLine};
pub use cart::{CartLineItem, CartState, CartStore, CartTotals, CART_STORAGE_KEY};
