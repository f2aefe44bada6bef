//! Checkout, payment verification, and order history.
//!
//! # Flows
//!
//! Lines are priced at live product prices, as the cart view shows them.
//!
//! Cash on delivery writes the order immediately. The ledger drains the cart
//! in the same transaction and refuses if the cart no longer matches the rows
//! the totals were computed from.
//!
//! Online payment creates a pending processor order and writes nothing
//! locally. The order is written by [`CheckoutService::verify_payment`] once
//! the processor's signature checks out and the processor order's amount
//! matches the claimed total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use mercato_core::{
    Address, Currency, CustomerContact, NewOrder, Order, OrderLine, PaymentMethod,
    PaymentReference, PaymentStatus, TaxRate, Totals, UserId, to_minor_units,
};

use super::cart::{live_line, live_products};
use super::{AddressForm, ServiceError, optional_email, required, required_address};
use crate::config::ApiConfig;
use crate::db::{CartSettlement, RepositoryError, Stores};
use crate::payments::{
    CreateOrderRequest, OrderNotes, PaymentError, PaymentGateway, SignatureVerifier,
};

/// Pricing and processor settings used at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub tax_rate: TaxRate,
    pub currency: Currency,
    /// Public processor key id handed to the client for the payment widget.
    pub key_id: String,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            tax_rate: config.tax_rate,
            currency: config.payment.currency,
            key_id: config.payment.key_id.clone(),
        }
    }
}

/// Checkout request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub user_id: Option<UserId>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub email: Option<String>,
    pub address: Option<AddressForm>,
    pub payment_method: Option<String>,
}

/// A checkout request with every required field present.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub customer: CustomerContact,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MissingFields` with one message per missing
    /// field, or `ServiceError::InvalidFields` for a malformed email.
    pub fn validate(&self) -> Result<CheckoutRequest, ServiceError> {
        let mut missing = Vec::new();
        if self.user_id.is_none() {
            missing.push("userId is required".to_owned());
        }
        let name = required("name", self.name.as_deref(), &mut missing);
        let number = required("number", self.number.as_deref(), &mut missing);
        let address = required_address(self.address.as_ref(), &mut missing);
        let method = required("paymentMethod", self.payment_method.as_deref(), &mut missing);

        let (Some(user_id), Some(name), Some(number), Some(address), Some(method)) =
            (self.user_id, name, number, address, method)
        else {
            return Err(ServiceError::MissingFields(missing));
        };

        Ok(CheckoutRequest {
            user_id,
            customer: CustomerContact {
                name: name.to_owned(),
                number: number.to_owned(),
                email: optional_email(self.email.as_deref())?,
                address,
            },
            payment_method: PaymentMethod::from_label(method),
        })
    }
}

/// Payment verification request body.
///
/// The processor ids are accepted under both the processor's field names and
/// neutral `external*` aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentForm {
    #[serde(alias = "externalOrderId")]
    pub razorpay_order_id: Option<String>,
    #[serde(alias = "externalPaymentId")]
    pub razorpay_payment_id: Option<String>,
    #[serde(alias = "signature")]
    pub razorpay_signature: Option<String>,
    pub user_id: Option<UserId>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub email: Option<String>,
    pub address: Option<AddressForm>,
    pub items: Option<Vec<OrderLine>>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,
}

/// A verification request with every required field present.
#[derive(Debug, Clone)]
pub struct VerifyPaymentRequest {
    pub payment: PaymentReference,
    pub user_id: UserId,
    pub customer: CustomerContact,
    pub items: Vec<OrderLine>,
    pub total: Decimal,
}

impl VerifyPaymentForm {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MissingFields` with one message per missing
    /// field, or `ServiceError::InvalidFields` for a malformed email.
    pub fn validate(&self) -> Result<VerifyPaymentRequest, ServiceError> {
        let mut missing = Vec::new();
        let order_id = required("razorpayOrderId", self.razorpay_order_id.as_deref(), &mut missing);
        let payment_id = required(
            "razorpayPaymentId",
            self.razorpay_payment_id.as_deref(),
            &mut missing,
        );
        let signature = required(
            "razorpaySignature",
            self.razorpay_signature.as_deref(),
            &mut missing,
        );
        if self.user_id.is_none() {
            missing.push("userId is required".to_owned());
        }
        let name = required("name", self.name.as_deref(), &mut missing);
        let number = required("number", self.number.as_deref(), &mut missing);
        let address = required_address(self.address.as_ref(), &mut missing);
        let items = self.items.as_ref().filter(|items| !items.is_empty());
        if items.is_none() {
            missing.push("items are required".to_owned());
        }
        if self.total.is_none() {
            missing.push("total is required".to_owned());
        }

        let (
            Some(order_id),
            Some(payment_id),
            Some(signature),
            Some(user_id),
            Some(name),
            Some(number),
            Some(address),
            Some(items),
            Some(total),
        ) = (
            order_id,
            payment_id,
            signature,
            self.user_id,
            name,
            number,
            address,
            items,
            self.total,
        )
        else {
            return Err(ServiceError::MissingFields(missing));
        };

        Ok(VerifyPaymentRequest {
            payment: PaymentReference {
                razorpay_order_id: order_id.to_owned(),
                razorpay_payment_id: payment_id.to_owned(),
                razorpay_signature: signature.to_owned(),
            },
            user_id,
            customer: CustomerContact {
                name: name.to_owned(),
                number: number.to_owned(),
                email: optional_email(self.email.as_deref())?,
                address,
            },
            items: items.clone(),
            total,
        })
    }
}

/// What the client needs to open the processor's payment widget.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayment {
    pub razorpay_order_id: String,
    /// Amount in minor units, as echoed by the processor.
    pub amount: i64,
    pub currency: String,
    pub key: String,
    pub items: Vec<OrderLine>,
    pub customer: CustomerContact,
}

/// Result of a checkout.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// A cash-on-delivery order was written and the cart drained.
    Placed(Order),
    /// A processor order awaits payment; nothing was written locally.
    AwaitingPayment(PendingPayment),
}

/// Checkout service.
pub struct CheckoutService<'a> {
    stores: &'a Stores,
    gateway: &'a dyn PaymentGateway,
    verifier: &'a SignatureVerifier,
    settings: &'a CheckoutSettings,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        stores: &'a Stores,
        gateway: &'a dyn PaymentGateway,
        verifier: &'a SignatureVerifier,
        settings: &'a CheckoutSettings,
    ) -> Self {
        Self {
            stores,
            gateway,
            verifier,
            settings,
        }
    }

    /// Price the user's cart and either place a cash-on-delivery order or
    /// open a processor order for online payment.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::EmptyCart` when the cart has no rows,
    /// `ServiceError::CartChanged` when the cart changed before the order was
    /// written, and `ServiceError::Payment` when the processor call fails.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, method = %request.payment_method))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, ServiceError> {
        let CheckoutRequest {
            user_id,
            customer,
            payment_method,
        } = request;

        let cart = self.stores.carts.items(user_id).await?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let products = live_products(self.stores.products.as_ref(), &cart).await?;
        let lines: Vec<OrderLine> = cart
            .iter()
            .zip(&products)
            .map(|(row, product)| live_line(row, product.as_ref()))
            .collect();

        match payment_method {
            PaymentMethod::Online => {
                let totals = Totals::compute(&lines, self.settings.tax_rate);
                let pending = self.open_payment(user_id, customer, lines, totals).await?;
                Ok(CheckoutOutcome::AwaitingPayment(pending))
            }
            PaymentMethod::CashOnDelivery => {
                let address = customer.address.clone();
                let order = NewOrder::priced(
                    user_id,
                    customer,
                    lines,
                    self.settings.tax_rate,
                    PaymentMethod::CashOnDelivery,
                    PaymentStatus::Pending,
                );
                let order = self
                    .stores
                    .orders
                    .place(order, CartSettlement::Expect(cart))
                    .await
                    .map_err(cart_changed)?;

                info!(order_id = %order.id, total = %order.total, "Order placed");
                self.save_address(user_id, &address).await;
                Ok(CheckoutOutcome::Placed(order))
            }
        }
    }

    async fn open_payment(
        &self,
        user_id: UserId,
        customer: CustomerContact,
        items: Vec<OrderLine>,
        totals: Totals,
    ) -> Result<PendingPayment, ServiceError> {
        let amount = to_minor_units(totals.total)
            .ok_or_else(|| PaymentError::InvalidAmount(totals.total.to_string()))?;

        let processor_order = self
            .gateway
            .create_order(CreateOrderRequest {
                amount,
                currency: self.settings.currency.code().to_owned(),
                receipt: receipt_id(Utc::now()),
                notes: OrderNotes {
                    user_id: user_id.to_string(),
                    name: customer.name.clone(),
                    number: customer.number.clone(),
                    address: customer.address.to_string(),
                },
            })
            .await?;

        info!(
            processor_order_id = %processor_order.id,
            amount = processor_order.amount,
            "Processor order created"
        );

        Ok(PendingPayment {
            razorpay_order_id: processor_order.id,
            amount: processor_order.amount,
            currency: processor_order.currency,
            key: self.settings.key_id.clone(),
            items,
            customer,
        })
    }

    /// Verify a processor payment and write the paid order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::SignatureMismatch` when the signature does not
    /// match, `ServiceError::InvalidFields` when the items or total are
    /// inconsistent or the total differs from the processor order, and
    /// `ServiceError::Payment` when the processor order cannot be fetched.
    #[instrument(
        skip(self, request),
        fields(
            user_id = %request.user_id,
            processor_order_id = %request.payment.razorpay_order_id,
        )
    )]
    pub async fn verify_payment(&self, request: VerifyPaymentRequest) -> Result<Order, ServiceError> {
        let VerifyPaymentRequest {
            payment,
            user_id,
            customer,
            items,
            total,
        } = request;

        if !self.verifier.verify(
            &payment.razorpay_order_id,
            &payment.razorpay_payment_id,
            &payment.razorpay_signature,
        ) {
            warn!("Payment signature mismatch");
            return Err(ServiceError::SignatureMismatch);
        }

        check_lines(&items, total, self.settings.tax_rate)?;
        self.check_paid_amount(&payment.razorpay_order_id, total).await?;

        if self
            .stores
            .orders
            .exists_for_payment(&payment.razorpay_payment_id)
            .await?
        {
            warn!(
                payment_id = %payment.razorpay_payment_id,
                "Payment already recorded on another order"
            );
        }

        let address = customer.address.clone();
        let order = NewOrder::priced(
            user_id,
            customer,
            items,
            self.settings.tax_rate,
            PaymentMethod::Online,
            PaymentStatus::Paid,
        )
        .with_payment(payment);

        let order = self
            .stores
            .orders
            .place(order, CartSettlement::Clear)
            .await?;

        info!(order_id = %order.id, total = %order.total, "Paid order placed");
        self.save_address(user_id, &address).await;
        Ok(order)
    }

    /// The processor order must be for `total` in the configured currency.
    async fn check_paid_amount(
        &self,
        processor_order_id: &str,
        total: Decimal,
    ) -> Result<(), ServiceError> {
        let processor_order = self.gateway.fetch_order(processor_order_id).await?;
        let amount = to_minor_units(total)
            .ok_or_else(|| PaymentError::InvalidAmount(total.to_string()))?;

        if processor_order.amount != amount
            || processor_order.currency != self.settings.currency.code()
        {
            warn!(
                claimed = amount,
                processor_amount = processor_order.amount,
                processor_currency = %processor_order.currency,
                "Claimed total does not match processor order"
            );
            return Err(ServiceError::InvalidFields(vec![format!(
                "total does not match processor order {processor_order_id}"
            )]));
        }
        Ok(())
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the database operation fails.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, ServiceError> {
        Ok(self.stores.orders.list_for_user(user_id).await?)
    }

    /// Remember the delivery address. Failures are logged, not returned.
    async fn save_address(&self, user_id: UserId, address: &Address) {
        match self.stores.users.append_address(user_id, address).await {
            Ok(true) => info!("Delivery address saved"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to save delivery address"),
        }
    }
}

/// Processor receipt for an order opened at `now`.
fn receipt_id(now: DateTime<Utc>) -> String {
    format!("order_rcptid_{}", now.timestamp_millis())
}

fn cart_changed(e: RepositoryError) -> ServiceError {
    match e {
        RepositoryError::Conflict(_) => ServiceError::CartChanged,
        other => ServiceError::Repository(other),
    }
}

/// Check client-supplied lines and total against the pricing rules.
fn check_lines(items: &[OrderLine], total: Decimal, rate: TaxRate) -> Result<(), ServiceError> {
    let mut invalid: Vec<String> = items
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_consistent())
        .map(|(i, _)| format!("items[{i}].subtotal must equal price * quantity"))
        .collect();

    let expected = Totals::compute(items, rate).total;
    if invalid.is_empty() && total != expected {
        invalid.push(format!("total must be {expected}"));
    }

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(invalid))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercato_core::ProductId;

    fn line(price: i64, quantity: u32) -> OrderLine {
        OrderLine::new(ProductId::new(), "item", Decimal::from(price), quantity)
    }

    fn address() -> AddressForm {
        AddressForm {
            line1: Some("4 Park Street".to_owned()),
            city: Some("Kolkata".to_owned()),
            state: Some("WB".to_owned()),
            zip: Some("700016".to_owned()),
        }
    }

    #[test]
    fn test_receipt_id_uses_millis() {
        let now = DateTime::from_timestamp_millis(1_718_000_000_123).unwrap();
        assert_eq!(receipt_id(now), "order_rcptid_1718000000123");
    }

    #[test]
    fn test_checkout_form_lists_every_missing_field() {
        let form = CheckoutForm {
            name: Some("Asha".to_owned()),
            ..CheckoutForm::default()
        };
        let Err(ServiceError::MissingFields(missing)) = form.validate() else {
            panic!("expected missing fields");
        };
        assert_eq!(
            missing,
            vec![
                "userId is required",
                "number is required",
                "address is required",
                "paymentMethod is required",
            ]
        );
    }

    #[test]
    fn test_checkout_form_payment_method_falls_back_to_cod() {
        let form = CheckoutForm {
            user_id: Some(UserId::new()),
            name: Some("Asha".to_owned()),
            number: Some("9876543210".to_owned()),
            email: None,
            address: Some(address()),
            payment_method: Some("UPI".to_owned()),
        };
        let request = form.validate().unwrap();
        assert_eq!(request.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(request.customer.address.city, "Kolkata");
    }

    #[test]
    fn test_verify_form_accepts_external_aliases() {
        let json = serde_json::json!({
            "externalOrderId": "order_1",
            "externalPaymentId": "pay_1",
            "signature": "abc",
            "userId": UserId::new(),
            "name": "Asha",
            "number": "9876543210",
            "address": {"line1": "4 Park Street", "city": "Kolkata", "state": "WB", "zip": "700016"},
            "items": [line(100, 2)],
            "total": 236
        });
        let form: VerifyPaymentForm = serde_json::from_value(json).unwrap();
        let request = form.validate().unwrap();
        assert_eq!(request.payment.razorpay_order_id, "order_1");
        assert_eq!(request.total, Decimal::from(236));
    }

    #[test]
    fn test_verify_form_requires_items() {
        let form = VerifyPaymentForm {
            items: Some(Vec::new()),
            ..VerifyPaymentForm::default()
        };
        let Err(ServiceError::MissingFields(missing)) = form.validate() else {
            panic!("expected missing fields");
        };
        assert!(missing.contains(&"items are required".to_owned()));
        assert!(missing.contains(&"razorpaySignature is required".to_owned()));
    }

    #[test]
    fn test_check_lines_accepts_matching_total() {
        // 100*2 + 50*1 = 250, tax 45, total 295
        let items = vec![line(100, 2), line(50, 1)];
        assert!(check_lines(&items, Decimal::from(295), TaxRate::STANDARD).is_ok());
    }

    #[test]
    fn test_check_lines_rejects_wrong_total() {
        let items = vec![line(100, 2), line(50, 1)];
        assert!(matches!(
            check_lines(&items, Decimal::from(250), TaxRate::STANDARD),
            Err(ServiceError::InvalidFields(_))
        ));
    }

    #[test]
    fn test_check_lines_rejects_tampered_subtotal() {
        let mut tampered = line(100, 2);
        tampered.subtotal = Decimal::from(1);
        let Err(ServiceError::InvalidFields(invalid)) =
            check_lines(&[tampered], Decimal::from(1), TaxRate::STANDARD)
        else {
            panic!("expected invalid fields");
        };
        assert_eq!(invalid, vec!["items[0].subtotal must equal price * quantity"]);
    }
}
