//! Mercato Core - Shared domain types.
//!
//! This crate provides the types used across all Mercato components:
//! - `api` - HTTP backend (cart, checkout, payments, reference data, accounts)
//! - `cli` - Command-line tools for migrations, retention sweeps, and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! database access, no HTTP clients. Order totals and tax rounding live here
//! so every caller computes them the same way.
//!
//! # Modules
//!
//! - [`types`] - IDs, money and totals, statuses, roles, contact details,
//!   cart and order records, and the reference taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
