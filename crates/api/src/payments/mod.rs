//! Payment processor integration (Razorpay-compatible).
//!
//! This module provides:
//! - [`PaymentGateway`], the seam services use to create processor orders
//! - [`RazorpayClient`], the HTTPS implementation
//! - [`SignatureVerifier`] for checking payment signatures locally
//!
//! # Flow
//!
//! 1. Online checkout creates a pending processor order for the cart total
//! 2. The client completes payment with the processor
//! 3. The processor returns `order_id`, `payment_id`, and a signature
//! 4. Verification recomputes the signature, checks the claimed total against
//!    the processor order, and writes the order

mod client;
mod error;
mod signature;
mod types;

use async_trait::async_trait;

pub use client::RazorpayClient;
pub use error::PaymentError;
pub use signature::SignatureVerifier;
pub use types::{CreateOrderRequest, OrderNotes, ProcessorOrder};

/// Creates and looks up orders with the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a processor order awaiting payment.
    async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<ProcessorOrder, PaymentError>;

    /// Fetch a processor order by id.
    async fn fetch_order(&self, id: &str) -> Result<ProcessorOrder, PaymentError>;
}
