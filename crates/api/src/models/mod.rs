//! Domain models owned by the API.
//!
//! Types shared with other crates live in `mercato-core`; these are the
//! records only the HTTP backend reads and writes.

pub mod product;
pub mod session;
pub mod user;

pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::{LoginKey, NewUser, User, UserSummary};
