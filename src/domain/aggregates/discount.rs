//! Discount codes
//!
//! [`DiscountBook`] is the validation collaborator the cart relies on: it
//! resolves a shopper-entered code against the current subtotal and returns a
//! [`DiscountQuote`]. The cart applies the quote as-is.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    Percentage,
    FixedAmount,
    FreeShipping,
    BuyXGetY,
}

impl DiscountKind {
    /// Amount taken off the cart subtotal. Fixed amounts are not capped here.
    pub fn cart_amount(&self, subtotal: Money, value: Decimal) -> Money {
        match self {
            Self::Percentage => subtotal.percent(value),
            Self::FixedAmount => Money::new(value),
            Self::FreeShipping | Self::BuyXGetY => Money::ZERO,
        }
    }

    pub fn waives_shipping(&self) -> bool {
        match self {
            Self::FreeShipping => true,
            Self::Percentage | Self::FixedAmount | Self::BuyXGetY => false,
        }
    }
}

/// Discount currently attached to a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Money,
}

/// A discount code as managed in the back office.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub min_purchase_amount: Option<Money>,
}

fn default_active() -> bool { true }

/// Resolved discount returned to the storefront.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountQuote {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
    pub description: String,
    pub discount_amount: Money,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscountRejection {
    #[error("Discount code is required")]
    CodeRequired,
    #[error("Invalid discount code")]
    InvalidCode,
    #[error("This discount code is no longer active")]
    Inactive,
    #[error("This discount code has expired")]
    Expired,
    #[error("This discount code is not yet active")]
    NotYetActive,
    #[error("This discount code has reached its usage limit")]
    UsageLimitReached,
    #[error("Minimum purchase of {0} required for this discount")]
    MinimumPurchase(Money),
}

impl DiscountCode {
    pub fn new(code: impl Into<String>, kind: DiscountKind, value: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(), code: code.into().trim().to_uppercase(), kind, value, description: None,
            is_active: true, starts_at: None, expires_at: None, usage_limit: None, usage_count: 0,
            min_purchase_amount: None,
        }
    }

    /// Checks run in a fixed order; the first failing rule wins.
    pub fn quote(&self, subtotal: Money, now: DateTime<Utc>) -> Result<DiscountQuote, DiscountRejection> {
        if !self.is_active { return Err(DiscountRejection::Inactive); }
        if self.expires_at.is_some_and(|at| now > at) { return Err(DiscountRejection::Expired); }
        if self.starts_at.is_some_and(|at| now < at) { return Err(DiscountRejection::NotYetActive); }
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return Err(DiscountRejection::UsageLimitReached);
        }
        if let Some(min) = self.min_purchase_amount {
            if subtotal < min { return Err(DiscountRejection::MinimumPurchase(min)); }
        }

        let (discount_amount, description) = match self.kind {
            DiscountKind::Percentage => (subtotal.percent(self.value), format!("{}% off", self.value.normalize())),
            DiscountKind::FixedAmount => (Money::new(self.value).min(subtotal), format!("{} off", Money::new(self.value))),
            DiscountKind::FreeShipping => (Money::ZERO, "Free shipping".to_string()),
            DiscountKind::BuyXGetY => (
                Money::ZERO,
                self.description.clone().unwrap_or_else(|| "Discount applied".to_string()),
            ),
        };

        Ok(DiscountQuote { code: self.code.clone(), kind: self.kind, value: self.value, description, discount_amount })
    }
}

/// In-memory registry of discount codes, keyed by upper-cased code.
#[derive(Clone, Debug, Default)]
pub struct DiscountBook { codes: HashMap<String, DiscountCode> }

impl DiscountBook {
    pub fn new() -> Self { Self::default() }

    pub fn from_codes(codes: impl IntoIterator<Item = DiscountCode>) -> Self {
        let mut book = Self::new();
        for code in codes { book.insert(code); }
        book
    }

    pub fn insert(&mut self, mut code: DiscountCode) {
        code.code = code.code.trim().to_uppercase();
        self.codes.insert(code.code.clone(), code);
    }

    pub fn get(&self, code: &str) -> Option<&DiscountCode> { self.codes.get(&code.trim().to_uppercase()) }
    pub fn len(&self) -> usize { self.codes.len() }
    pub fn is_empty(&self) -> bool { self.codes.is_empty() }

    pub fn validate(&self, code: &str, subtotal: Money, now: DateTime<Utc>) -> Result<DiscountQuote, DiscountRejection> {
        if code.trim().is_empty() { return Err(DiscountRejection::CodeRequired); }
        let discount = self.get(code).ok_or(DiscountRejection::InvalidCode)?;
        let result = discount.quote(subtotal, now);
        if let Err(reason) = &result {
            debug!(code = %discount.code, %reason, "discount code rejected");
        }
        result
    }
}
