//! Cart operations.
//!
//! Cart rows hold the price seen when the product was added. Reading a cart
//! shows live prices next to that snapshot but never writes; persisting the
//! live price is the separate [`CartService::reconcile`] step. Checkout
//! prices rows the same way the view does, so the total shown is the total
//! charged.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use mercato_core::{CartItem, NewCartItem, OrderLine, ProductId, Role, Totals, UserId};

use super::ServiceError;
use crate::config::ApiConfig;
use crate::db::{ProductCatalog, RepositoryError, Stores};
use crate::models::Product;

/// Largest quantity accepted in a single add.
pub const MAX_QUANTITY: u32 = 10_000;

/// One cart row as shown to the buyer, priced at the live product price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub line: OrderLine,
    /// Price stored when the row was added.
    #[serde(with = "rust_decimal::serde::float")]
    pub snapshot_price: Decimal,
    pub price_changed: bool,
    pub image_url: String,
}

/// A priced view of a cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    #[serde(flatten)]
    pub totals: Totals,
}

/// A snapshot price replaced by the live price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
}

/// Cart service.
pub struct CartService<'a> {
    stores: &'a Stores,
    config: &'a ApiConfig,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores, config: &'a ApiConfig) -> Self {
        Self { stores, config }
    }

    /// Add `quantity` of a product, merging into an existing row.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidFields` for a quantity outside
    /// `1..=MAX_QUANTITY`, `ServiceError::RoleMismatch` unless the user is a
    /// customer, and `ServiceError::NotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, ServiceError> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| (1..=MAX_QUANTITY).contains(q))
            .ok_or_else(|| {
                ServiceError::InvalidFields(vec![format!(
                    "quantity must be between 1 and {MAX_QUANTITY}"
                )])
            })?;

        self.ensure_customer(user_id).await?;

        let product = self
            .stores
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(ServiceError::NotFound("product"))?;

        let item = self
            .stores
            .carts
            .add(NewCartItem {
                user_id,
                product_id,
                name: product.name,
                price: product.price,
                quantity,
            })
            .await?;

        Ok(item)
    }

    /// The cart priced at live product prices. Never writes.
    ///
    /// Rows whose product has disappeared keep their snapshot price.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RoleMismatch` unless the user is a customer.
    #[instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<CartView, ServiceError> {
        self.ensure_customer(user_id).await?;

        let rows = self.stores.carts.items(user_id).await?;
        let products = live_products(self.stores.products.as_ref(), &rows).await?;
        let mut items = Vec::with_capacity(rows.len());
        for (row, product) in rows.into_iter().zip(products) {
            let line = live_line(&row, product.as_ref());
            let thumbnail = product.as_ref().and_then(|p| p.thumbnail.as_deref());

            items.push(CartLine {
                snapshot_price: row.price,
                price_changed: line.price != row.price,
                image_url: self.config.product_image_url(thumbnail),
                line,
            });
        }

        let totals = Totals::compute(items.iter().map(|item| &item.line), self.config.tax_rate);
        Ok(CartView { items, totals })
    }

    /// Write live prices into rows whose snapshot has drifted.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RoleMismatch` unless the user is a customer.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, user_id: UserId) -> Result<Vec<PriceChange>, ServiceError> {
        self.ensure_customer(user_id).await?;

        let mut changes = Vec::new();
        for row in self.stores.carts.items(user_id).await? {
            let Some(product) = self.stores.products.find_by_id(row.product_id).await? else {
                continue;
            };
            if product.price == row.price {
                continue;
            }

            self.stores.carts.reprice(row.id, product.price).await?;
            changes.push(PriceChange {
                product_id: row.product_id,
                name: row.name,
                previous_price: row.price,
                current_price: product.price,
            });
        }

        if !changes.is_empty() {
            info!(changed = changes.len(), "Cart prices reconciled");
        }
        Ok(changes)
    }

    /// Remove one product. Removing something absent is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the database operation fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<u64, ServiceError> {
        Ok(self.stores.carts.remove(user_id, product_id).await?)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the database operation fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, ServiceError> {
        Ok(self.stores.carts.clear(user_id).await?)
    }

    async fn ensure_customer(&self, user_id: UserId) -> Result<(), ServiceError> {
        match self.stores.users.find_by_id(user_id).await? {
            Some(user) if user.role == Role::Customer => Ok(()),
            _ => Err(ServiceError::RoleMismatch),
        }
    }
}

/// The live product behind each row, `None` where it has been deleted.
pub(crate) async fn live_products(
    catalog: &dyn ProductCatalog,
    rows: &[CartItem],
) -> Result<Vec<Option<Product>>, RepositoryError> {
    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        products.push(catalog.find_by_id(row.product_id).await?);
    }
    Ok(products)
}

/// A row priced at its product's live price, or at the snapshot when the
/// product is gone.
pub(crate) fn live_line(row: &CartItem, product: Option<&Product>) -> OrderLine {
    let price = product.map_or(row.price, |p| p.price);
    OrderLine::new(row.product_id, row.name.clone(), price, row.quantity)
}
