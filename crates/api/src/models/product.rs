//! Read-only view of a catalog product.

use rust_decimal::Decimal;
use serde::Serialize;

use mercato_core::ProductId;

/// The fields checkout and the cart need from a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Sale price, or the list price when no sale price is set.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub thumbnail: Option<String>,
}
