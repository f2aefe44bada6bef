//! Mercato API - commerce backend.
//!
//! The binary in `main.rs` wires these modules into an axum server; the
//! library form exists so the CLI and the integration tests can reuse the
//! stores, services, and router.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration and secret validation
//! - [`db`] - Store traits and their `PostgreSQL` repositories
//! - [`payments`] - Payment processor client and signature verification
//! - [`services`] - Cart, checkout, reference data, and accounts
//! - [`routes`] / [`middleware`] - HTTP surface
//! - [`sweeper`] - Daily retention purge

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod sweeper;

pub use error::AppError;
pub use state::AppState;
