//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness
//! GET    /health/ready                - Database readiness
//!
//! # Accounts
//! POST   /api/auth/register           - Register
//! POST   /api/auth/login              - Login (rate limited)
//! POST   /api/auth/logout             - Logout
//! GET    /api/auth/role               - Session user's role
//! GET    /api/auth/users              - List accounts (admin)
//!
//! # Cart (owner or admin)
//! POST   /api/cart/add                - Add a product
//! GET    /api/cart?userId=            - Priced cart view (read-only)
//! POST   /api/cart/reconcile          - Persist live prices
//! POST   /api/cart/remove             - Remove a product
//! POST   /api/cart/clear              - Empty the cart
//!
//! # Orders (owner or admin)
//! POST   /api/orders/checkout         - COD order or processor order
//! POST   /api/orders/verify-payment   - Verify signature, write paid order
//! GET    /api/orders?userId=          - Order history
//!
//! # Reference data
//! GET    /api/reference               - List categories
//! POST   /api/reference               - Create category / append items (admin)
//! DELETE /api/reference/item/{id}     - Soft-delete item (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod extract;
pub mod health;
pub mod orders;
pub mod reference;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use serde::Deserialize;

use mercato_core::UserId;

use crate::error::AppError;
use crate::middleware::{json_rate_limit_response, login_rate_limiter};
use crate::state::AppState;

/// A body or query string that only names the target user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<UserId>,
}

impl UserQuery {
    /// The target user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MissingField` when `userId` is absent.
    pub fn required(&self) -> Result<UserId, AppError> {
        self.user_id
            .ok_or_else(|| AppError::MissingField(vec!["userId is required".to_owned()]))
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let login = Router::new()
        .route("/login", post(auth::login))
        .layer(login_rate_limiter())
        .layer(middleware::map_response(json_rate_limit_response));

    Router::new()
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/role", get(auth::role))
        .route("/users", get(auth::users))
        .merge(login)
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/reconcile", post(cart::reconcile))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/checkout", post(orders::checkout))
        .route("/verify-payment", post(orders::verify_payment))
}

/// Create the reference data routes router.
pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reference::list).post(reference::create_or_append))
        .route("/item/{id}", delete(reference::delete_item))
}

/// Create all routes. The session layer is added by the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/reference", reference_routes())
}
