//! Payment-processor errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("payment request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("payment response error: {0}")]
    Response(String),

    /// Processor returned an error status.
    #[error("payment processor error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description from the processor.
        message: String,
    },

    /// The order total cannot be expressed in minor units.
    #[error("amount out of range: {0}")]
    InvalidAmount(String),
}
