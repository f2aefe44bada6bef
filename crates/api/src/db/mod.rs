//! Database operations for the commerce backend.
//!
//! # Tables
//!
//! - `users` - Accounts, role keys, password hashes, saved addresses (JSONB)
//! - `products` - Catalog (read-only here; managed elsewhere)
//! - `cart_items` - One row per (user, product) with a price snapshot
//! - `orders` - Append-only order ledger; lines and customer block as JSONB
//! - `reference_categories` / `reference_items` - Taxonomy registry
//! - `tower_sessions.session` - Session storage
//!
//! Each store is a trait so services can run against `PostgreSQL` in
//! production and in-memory stores in tests. The `*Repository` types in the
//! submodules are the `PostgreSQL` implementations.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p mercato-cli -- migrate
//! ```

pub mod carts;
pub mod orders;
pub mod products;
pub mod reference;
pub mod retention;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use mercato_core::{
    Address, CartItem, CartItemId, NewCartItem, NewOrder, NewReferenceItem, Order,
    ProductId, ReferenceCategory, ReferenceCategoryId, ReferenceCategoryKind, ReferenceItem,
    ReferenceItemId, Role, UserId,
};

pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reference::ReferenceRepository;
pub use retention::{RetentionRepository, RetentionTarget};
pub use users::UserRepository;

use crate::models::{LoginKey, NewUser, Product, User};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint or state conflict.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Map a unique-violation into [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Store traits
// =============================================================================

/// Read-only product lookups.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Find a live (not soft-deleted) product.
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Find a user together with their password hash.
    async fn find_credentials(
        &self,
        key: LoginKey<'_>,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Every live account, oldest first.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// Number of live accounts holding `role`.
    async fn count_with_role(&self, role: Role) -> Result<u64, RepositoryError>;

    /// Create an account. Duplicate email or mobile yields `Conflict`.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Append `address` to the saved list unless an equal one is present.
    ///
    /// Returns whether the address was added.
    async fn append_address(&self, id: UserId, address: &Address)
    -> Result<bool, RepositoryError>;
}

/// Per-user cart rows.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Insert a row, or increment the quantity of the existing row for the
    /// same (user, product). The stored snapshot price is left unchanged on
    /// increment.
    async fn add(&self, item: NewCartItem) -> Result<CartItem, RepositoryError>;

    /// Overwrite the snapshot price of one row.
    async fn reprice(&self, id: CartItemId, price: Decimal) -> Result<(), RepositoryError>;

    /// Delete one product's row. Returns the number of rows removed.
    async fn remove(&self, user_id: UserId, product_id: ProductId)
    -> Result<u64, RepositoryError>;

    /// Delete every row for the user. Returns the number of rows removed.
    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}

/// What happens to the buyer's cart when an order is written.
#[derive(Debug, Clone)]
pub enum CartSettlement {
    /// Drain the cart, failing with `Conflict` unless it still holds exactly
    /// these rows.
    Expect(Vec<CartItem>),
    /// Drain whatever is in the cart.
    Clear,
}

/// The append-only order ledger.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Write an order and settle the buyer's cart in one transaction.
    async fn place(
        &self,
        order: NewOrder,
        settlement: CartSettlement,
    ) -> Result<Order, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Whether any order already records this processor payment id.
    async fn exists_for_payment(&self, payment_id: &str) -> Result<bool, RepositoryError>;
}

/// The taxonomy registry.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// All categories with all their items, deleted ones included.
    async fn list(&self) -> Result<Vec<ReferenceCategory>, RepositoryError>;

    async fn find(
        &self,
        kind: ReferenceCategoryKind,
    ) -> Result<Option<ReferenceCategory>, RepositoryError>;

    /// Create a category. An existing category with the same key yields `Conflict`.
    async fn create(
        &self,
        kind: ReferenceCategoryKind,
        label: &str,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError>;

    /// Append items to a category and return the updated category.
    async fn append(
        &self,
        id: ReferenceCategoryId,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError>;

    /// Mark an item deleted. `NotFound` if absent, `Conflict` if already deleted.
    async fn soft_delete_item(&self, id: ReferenceItemId)
    -> Result<ReferenceItem, RepositoryError>;
}

/// Hard deletion of soft-deleted rows.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Delete rows of `target` soft-deleted before `cutoff`. Returns the count.
    async fn purge(
        &self,
        target: RetentionTarget,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// Every store the services need, as shared trait objects.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductCatalog>,
    pub users: Arc<dyn UserStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderLedger>,
    pub reference: Arc<dyn ReferenceStore>,
    pub retention: Arc<dyn RetentionStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            products: Arc::new(ProductRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            carts: Arc::new(CartRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
            reference: Arc::new(ReferenceRepository::new(pool.clone())),
            retention: Arc::new(RetentionRepository::new(pool.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_on_unique_passes_other_errors_through() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "email");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}
