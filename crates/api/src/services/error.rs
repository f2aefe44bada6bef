//! Errors raised by the cart, checkout, and reference services.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::PaymentError;

/// Errors that can occur in the commerce services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// One or more required fields were absent or blank.
    #[error("missing required fields: {}", .0.join("; "))]
    MissingFields(Vec<String>),

    /// Fields were present but inconsistent or malformed.
    #[error("invalid fields: {}", .0.join("; "))]
    InvalidFields(Vec<String>),

    /// Checkout was attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The payment signature did not match the order and payment ids.
    #[error("payment signature mismatch")]
    SignatureMismatch,

    /// The cart changed between reading it and writing the order.
    #[error("cart changed during checkout")]
    CartChanged,

    /// The acting user does not hold the role this operation needs.
    #[error("only customers can use a cart")]
    RoleMismatch,

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request collides with existing state.
    #[error("{0}")]
    Conflict(String),

    /// The payment processor failed or rejected the call.
    #[error("payment processor error: {0}")]
    Payment(#[from] PaymentError),

    /// Storage failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    /// A single missing-field error.
    #[must_use]
    pub fn missing(field: &str) -> Self {
        Self::MissingFields(vec![format!("{field} is required")])
    }
}
