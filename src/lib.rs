//! La Pesqueria cart service
//!
//! Cart pricing for the storefront: line items, discount codes, and derived
//! subtotal / shipping / tax / total, persisted after every change.
//!
//! ## Features
//! - Cart store with an injectable storage port
//! - Discount code validation
//! - Checkout snapshot for order creation
//! - Per-session carts over HTTP, with cart events published to NATS

pub mod config;
pub mod domain;
pub mod http;
pub mod storage;

pub use config::{Config, PricingPolicy};
pub use domain::aggregates::{CartState, CartStore, CheckoutSnapshot, DiscountBook, DiscountKind};
pub use domain::events::CartEvent;
pub use domain::value_objects::Money;
pub use storage::{CartStorage, FileStorage, MemoryStorage};

use thiserror::Error;

use crate::domain::aggregates::DiscountRejection;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Discount(#[from] DiscountRejection),

    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Cart worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
