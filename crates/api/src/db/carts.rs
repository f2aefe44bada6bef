//! Cart rows.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use mercato_core::{CartItem, CartItemId, NewCartItem, ProductId, UserId};

use super::{CartStore, RepositoryError};

pub(super) const CART_COLUMNS: &str = "id, user_id, product_id, name, price, quantity";

#[derive(sqlx::FromRow)]
pub(super) struct CartRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    name: String,
    price: Decimal,
    quantity: i32,
}

impl TryFrom<CartRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "invalid cart quantity {} for item {}",
                    row.quantity, row.id
                ))
            })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            quantity,
        })
    }
}

pub(super) fn into_items(rows: Vec<CartRow>) -> Result<Vec<CartItem>, RepositoryError> {
    rows.into_iter().map(CartItem::try_from).collect()
}

/// `PostgreSQL` cart storage.
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_items(rows)
    }

    async fn add(&self, item: NewCartItem) -> Result<CartItem, RepositoryError> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| RepositoryError::Conflict("quantity out of range".to_owned()))?;

        let row = sqlx::query_as::<_, CartRow>(&format!(
            r"
            INSERT INTO cart_items (id, user_id, product_id, name, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
            RETURNING {CART_COLUMNS}
            "
        ))
        .bind(CartItemId::new())
        .bind(item.user_id)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        CartItem::try_from(row)
    }

    async fn reprice(&self, id: CartItemId, price: Decimal) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE cart_items SET price = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(price)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
