//! Core types for Mercato.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod contact;
pub mod id;
pub mod money;
pub mod order;
pub mod reference;
pub mod role;
pub mod status;

pub use cart::{CartItem, NewCartItem, carts_match};
pub use contact::{Address, AddressError, Email, EmailError};
pub use id::*;
pub use money::{Currency, TaxRate, Totals, to_minor_units};
pub use order::{CustomerContact, NewOrder, Order, OrderLine, PaymentReference};
pub use reference::{
    NewReferenceItem, ReferenceCategory, ReferenceCategoryKind, ReferenceError, ReferenceItem,
    ReferenceMetadata, Taxonomy, TaxonomyKey, slugify,
};
pub use role::{Role, RoleError};
pub use status::{PaymentMethod, PaymentStatus};
