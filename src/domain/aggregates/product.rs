//! Catalog snapshot handed to the cart
//!
//! These are the product and variant shapes the storefront passes when a
//! shopper adds something to the cart. The cart copies what it needs at
//! add-time and never re-reads them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Money;

/// Stock ceiling assumed for an in-stock product sold without variants.
pub const DEFAULT_STOCK_CEILING: u32 = 999;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub base_price: Money,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub conservation_info: Option<ConservationInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    #[serde(default)]
    pub id: Option<String>,
    pub variant_name: String,
    pub sku: String,
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProductImage { #[serde(default)] pub url: Option<String> }

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConservationInfo {
    #[serde(default)]
    pub donation_percentage: Option<Decimal>,
    #[serde(default)]
    pub conservation_focus: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sku: impl Into<String>, base_price: Money) -> Self {
        Self {
            id: id.into(), name: name.into(), sku: sku.into(), base_price,
            in_stock: true, images: vec![], conservation_info: None,
        }
    }

    /// Cart identity for this product: the variant id when there is one,
    /// otherwise a product-level key.
    pub fn line_item_id(&self, variant: Option<&ProductVariant>) -> String {
        match variant.and_then(ProductVariant::id) {
            Some(id) => id.to_string(),
            None => format!("product-{}", self.id),
        }
    }

    /// A variant priced at zero falls back to the base price.
    pub fn unit_price(&self, variant: Option<&ProductVariant>) -> Money {
        variant.map(|v| v.price).filter(|p| !p.is_zero()).unwrap_or(self.base_price)
    }

    pub fn available_stock(&self, variant: Option<&ProductVariant>) -> u32 {
        match variant {
            Some(v) if v.stock > 0 => v.stock,
            _ if self.in_stock => DEFAULT_STOCK_CEILING,
            _ => 0,
        }
    }

    /// Variant images win over product images.
    pub fn image_url(&self, variant: Option<&ProductVariant>) -> Option<String> {
        variant
            .and_then(|v| first_url(&v.images))
            .or_else(|| first_url(&self.images))
            .map(str::to_string)
    }
}

impl ProductVariant {
    pub fn new(id: impl Into<String>, variant_name: impl Into<String>, sku: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: Some(id.into()), variant_name: variant_name.into(), sku: sku.into(), price, stock,
            size: None, color: None, material: None, images: vec![],
        }
    }

    pub fn id(&self) -> Option<&str> { self.id.as_deref().filter(|id| !id.is_empty()) }
}

fn first_url(images: &[ProductImage]) -> Option<&str> {
    images.first()?.url.as_deref().filter(|url| !url.is_empty())
}
