//! Cart rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId, UserId};

/// One product in a user's cart, with the price captured when it was added.
///
/// A user has at most one row per product; adding the same product again
/// increments `quantity`. The snapshot may drift from the live product price
/// until the cart is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    /// `price * quantity` at the snapshot price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Whether `other` describes the same product, quantity, and price.
    ///
    /// Used to detect a cart that changed between reading it and settling it.
    #[must_use]
    pub fn same_contents(&self, other: &Self) -> bool {
        self.product_id == other.product_id
            && self.quantity == other.quantity
            && self.price == other.price
    }
}

/// Whether two reads of a cart hold the same products, quantities, and prices,
/// in any order.
#[must_use]
pub fn carts_match(a: &[CartItem], b: &[CartItem]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&CartItem> = a.iter().collect();
    let mut b: Vec<&CartItem> = b.iter().collect();
    a.sort_by_key(|item| item.product_id);
    b.sort_by_key(|item| item.product_id);
    a.iter().zip(&b).all(|(x, y)| x.same_contents(y))
}

/// A cart row to insert, or to merge into an existing row for the same product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}
