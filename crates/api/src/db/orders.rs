//! The order ledger.
//!
//! Orders are inserted in the same transaction that drains the buyer's cart,
//! so a cart can back at most one order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use mercato_core::{
    CustomerContact, NewOrder, Order, OrderId, OrderLine, PaymentMethod, PaymentReference,
    PaymentStatus, UserId, carts_match,
};

use super::carts::{CART_COLUMNS, CartRow, into_items};
use super::{CartSettlement, OrderLedger, RepositoryError};

const ORDER_COLUMNS: &str = "id, user_id, customer, items, subtotal, tax, total, \
     payment_method, payment_status, razorpay_order_id, razorpay_payment_id, \
     razorpay_signature, created_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    customer: Json<CustomerContact>,
    items: Json<Vec<OrderLine>>,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    payment_method: String,
    payment_status: String,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    razorpay_signature: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_method = row
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status = row
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(RepositoryError::DataCorruption)?;

        let payment = match (
            row.razorpay_order_id,
            row.razorpay_payment_id,
            row.razorpay_signature,
        ) {
            (Some(razorpay_order_id), Some(razorpay_payment_id), Some(razorpay_signature)) => {
                Some(PaymentReference {
                    razorpay_order_id,
                    razorpay_payment_id,
                    razorpay_signature,
                })
            }
            (None, None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {} has partial payment identifiers",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            customer: row.customer.0,
            items: row.items.0,
            subtotal: row.subtotal,
            tax: row.tax,
            total: row.total,
            payment_method,
            payment_status,
            payment,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL` order ledger.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderLedger for OrderRepository {
    #[instrument(skip(self, order, settlement), fields(user_id = %order.user_id))]
    async fn place(
        &self,
        order: NewOrder,
        settlement: CartSettlement,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Deleting takes the row locks; a concurrent checkout of the same cart
        // blocks here and then sees an empty cart.
        let drained = sqlx::query_as::<_, CartRow>(&format!(
            "DELETE FROM cart_items WHERE user_id = $1 RETURNING {CART_COLUMNS}"
        ))
        .bind(order.user_id)
        .fetch_all(&mut *tx)
        .await?;

        if let CartSettlement::Expect(snapshot) = &settlement {
            let drained = into_items(drained)?;
            if !carts_match(snapshot, &drained) {
                tx.rollback().await?;
                return Err(RepositoryError::Conflict(
                    "cart changed during checkout".to_owned(),
                ));
            }
        }

        let payment = order.payment.as_ref();
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (
                id, user_id, customer, items, subtotal, tax, total,
                payment_method, payment_status,
                razorpay_order_id, razorpay_payment_id, razorpay_signature
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(OrderId::new())
        .bind(order.user_id)
        .bind(Json(&order.customer))
        .bind(Json(&order.items))
        .bind(order.totals.subtotal)
        .bind(order.totals.tax)
        .bind(order.totals.total)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(payment.map(|p| p.razorpay_order_id.as_str()))
        .bind(payment.map(|p| p.razorpay_payment_id.as_str()))
        .bind(payment.map(|p| p.razorpay_signature.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Order::try_from(row)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn exists_for_payment(&self, payment_id: &str) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE razorpay_payment_id = $1)",
        )
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
