//! Service configuration, read from the environment (and `.env` via dotenvy).

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::aggregates::discount::{DiscountBook, DiscountCode};
use crate::domain::value_objects::Money;

/// Pricing constants used by the cart totals.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingPolicy {
    /// Shipping is free when the subtotal is strictly above this.
    pub free_shipping_threshold: Money,
    pub flat_shipping_fee: Money,
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_cents(5000),
            flat_shipping_fee: Money::from_cents(595),
            tax_rate: Decimal::new(825, 4),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub nats_url: Option<String>,
    pub storage_dir: PathBuf,
    pub discount_codes_path: Option<PathBuf>,
    pub pricing: PricingPolicy,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("failed to read discount codes from {path}: {source}")]
    DiscountCodesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed discount codes in {path}: {source}")]
    DiscountCodesFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: parse_or(&lookup, "FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold.amount())?.into(),
            flat_shipping_fee: parse_or(&lookup, "FLAT_SHIPPING_FEE", defaults.flat_shipping_fee.amount())?.into(),
            tax_rate: parse_or(&lookup, "TAX_RATE", defaults.tax_rate)?,
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8083)?,
            nats_url: lookup("NATS_URL").filter(|url| !url.is_empty()),
            storage_dir: lookup("CART_STORAGE_DIR").map_or_else(|| PathBuf::from("./data/carts"), PathBuf::from),
            discount_codes_path: lookup("DISCOUNT_CODES_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
            pricing,
        })
    }

    /// Empty book when no file is configured.
    pub fn load_discount_book(&self) -> Result<DiscountBook, ConfigError> {
        let Some(path) = &self.discount_codes_path else { return Ok(DiscountBook::new()) };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::DiscountCodesIo { path: path.clone(), source })?;
        let codes: Vec<DiscountCode> = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::DiscountCodesFormat { path: path.clone(), source })?;
        Ok(DiscountBook::from_codes(codes))
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
