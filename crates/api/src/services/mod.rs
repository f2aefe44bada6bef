//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration and password login
//! - `cart` - Cart reads, mutations, and price reconciliation
//! - `checkout` - Order placement, payment verification, order history
//! - `reference` - Taxonomy registry maintenance
//!
//! Services borrow their stores from [`crate::db::Stores`] and are built per
//! request; none of them hold state of their own.

pub mod auth;
pub mod cart;
pub mod checkout;
mod error;
pub mod reference;

pub use error::ServiceError;

use serde::Deserialize;

use mercato_core::{Address, Email};

/// A delivery address as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    pub line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl AddressForm {
    /// Validate into an [`Address`], recording each blank field as
    /// `address.<field> is required`.
    fn validate(&self, missing: &mut Vec<String>) -> Option<Address> {
        Address::from_parts(
            self.line1.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.zip.as_deref(),
        )
        .map_err(|e| {
            missing.extend(
                e.missing
                    .into_iter()
                    .map(|field| format!("address.{field} is required")),
            );
        })
        .ok()
    }
}

/// Trimmed value of a required field, recording it as missing when blank.
pub(crate) fn required<'v>(
    field: &str,
    value: Option<&'v str>,
    missing: &mut Vec<String>,
) -> Option<&'v str> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    if value.is_none() {
        missing.push(format!("{field} is required"));
    }
    value
}

/// The delivery address, which is required as a whole and per field.
pub(crate) fn required_address(
    address: Option<&AddressForm>,
    missing: &mut Vec<String>,
) -> Option<Address> {
    match address {
        Some(form) => form.validate(missing),
        None => {
            missing.push("address is required".to_owned());
            None
        }
    }
}

/// An optional email; blank counts as absent.
pub(crate) fn optional_email(email: Option<&str>) -> Result<Option<Email>, ServiceError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => Email::parse(raw)
            .map(Some)
            .map_err(|e| ServiceError::InvalidFields(vec![format!("email: {e}")])),
        None => Ok(None),
    }
}
