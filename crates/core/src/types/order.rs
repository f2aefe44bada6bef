//! Orders and order lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartItem;
use super::contact::{Address, Email};
use super::id::{OrderId, ProductId, UserId};
use super::money::{TaxRate, Totals};
use super::status::{PaymentMethod, PaymentStatus};

/// One purchased product with its frozen price and line subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl OrderLine {
    /// Build a line, computing `subtotal = price * quantity`.
    #[must_use]
    pub fn new(product_id: ProductId, name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            product_id,
            name: name.into(),
            price,
            quantity,
            subtotal: price * Decimal::from(quantity),
        }
    }

    /// Whether the stored subtotal matches `price * quantity`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.quantity >= 1 && self.subtotal == self.price * Decimal::from(self.quantity)
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self::new(item.product_id, item.name.clone(), item.price, item.quantity)
    }
}

/// Who the order is for and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    pub address: Address,
}

/// Identifiers issued by the payment processor for a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReference {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// An order ready to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub customer: CustomerContact,
    pub items: Vec<OrderLine>,
    pub totals: Totals,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment: Option<PaymentReference>,
}

impl NewOrder {
    /// Build an order from its lines, computing totals at `rate`.
    #[must_use]
    pub fn priced(
        user_id: UserId,
        customer: CustomerContact,
        items: Vec<OrderLine>,
        rate: TaxRate,
        payment_method: PaymentMethod,
        payment_status: PaymentStatus,
    ) -> Self {
        let totals = Totals::compute(&items, rate);
        Self {
            user_id,
            customer,
            items,
            totals,
            payment_method,
            payment_status,
            payment: None,
        }
    }

    /// Attach processor identifiers.
    #[must_use]
    pub fn with_payment(mut self, payment: PaymentReference) -> Self {
        self.payment = Some(payment);
        self
    }
}

/// A placed order. Only `payment_status` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer: CustomerContact,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentReference>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a ledger row from a [`NewOrder`].
    #[must_use]
    pub fn from_new(id: OrderId, order: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: order.user_id,
            customer: order.customer,
            items: order.items,
            subtotal: order.totals.subtotal,
            tax: order.totals.tax,
            total: order.totals.total,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            payment: order.payment,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CartItemId;

    fn contact() -> CustomerContact {
        CustomerContact {
            name: "Asha".to_owned(),
            number: "9800000000".to_owned(),
            email: None,
            address: Address {
                line1: "4 Park Street".to_owned(),
                city: "Kolkata".to_owned(),
                state: "WB".to_owned(),
                zip: "700016".to_owned(),
            },
        }
    }

    #[test]
    fn line_from_cart_item() {
        let item = CartItem {
            id: CartItemId::new(),
            user_id: UserId::new(),
            product_id: ProductId::new(),
            name: "Teak shelf".to_owned(),
            price: Decimal::from(100),
            quantity: 2,
        };
        let line = OrderLine::from(&item);
        assert_eq!(line.subtotal, Decimal::from(200));
        assert!(line.is_consistent());
    }

    #[test]
    fn tampered_line_is_inconsistent() {
        let mut line = OrderLine::new(ProductId::new(), "Rug", Decimal::from(40), 2);
        line.subtotal = Decimal::from(10);
        assert!(!line.is_consistent());
    }

    #[test]
    fn priced_order_total_includes_tax() {
        let items = vec![
            OrderLine::new(ProductId::new(), "A", Decimal::from(100), 2),
            OrderLine::new(ProductId::new(), "B", Decimal::from(50), 1),
        ];
        let order = NewOrder::priced(
            UserId::new(),
            contact(),
            items,
            TaxRate::STANDARD,
            PaymentMethod::CashOnDelivery,
            PaymentStatus::Pending,
        );
        assert_eq!(order.totals.total, Decimal::from(295));

        let placed = Order::from_new(OrderId::new(), order, Utc::now());
        let item_sum: Decimal = placed.items.iter().map(|l| l.subtotal).sum();
        assert_eq!(placed.total, item_sum + placed.tax);
    }

    #[test]
    fn order_json_shape() {
        let order = NewOrder::priced(
            UserId::new(),
            contact(),
            vec![OrderLine::new(ProductId::new(), "A", Decimal::from(10), 1)],
            TaxRate::STANDARD,
            PaymentMethod::Online,
            PaymentStatus::Paid,
        );
        let placed = Order::from_new(OrderId::new(), order, Utc::now());
        let json = serde_json::to_value(&placed).expect("serialize");
        assert_eq!(json["paymentMethod"], "Online");
        assert_eq!(json["paymentStatus"], "paid");
        assert!(json.get("payment").is_none());
    }
}
