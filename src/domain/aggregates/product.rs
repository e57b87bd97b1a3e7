//! Product snapshot as the storefront sees it when adding to the cart

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::DEFAULT_MAX_STOCK;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSize { pub size: String, pub price: Decimal, #[serde(default)] pub stock: Option<u32> }

/// Price and stock ceiling resolved for one size of a product.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeQuote { pub price: Decimal, pub max_stock: u32 }

impl Product {
    pub fn size(&self, size: &str) -> Option<&ProductSize> { self.sizes.iter().find(|s| s.size == size) }

    /// Unknown sizes resolve to price 0 and the default stock ceiling rather than failing.
    pub fn quote(&self, size: &str) -> SizeQuote {
        match self.size(size) {
            Some(s) => SizeQuote { price: s.price, max_stock: s.stock.unwrap_or(DEFAULT_MAX_STOCK) },
            None => SizeQuote { price: Decimal::ZERO, max_stock: DEFAULT_MAX_STOCK },
        }
    }
}
