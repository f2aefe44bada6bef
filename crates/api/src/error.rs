//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is JSON:
//!
//! ```json
//! { "success": false, "message": "Missing required fields", "errors": ["name is required"] }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::ServiceError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required fields were absent or blank.
    #[error("Missing required fields: {}", .0.join("; "))]
    MissingField(Vec<String>),

    /// Fields were present but invalid.
    #[error("Invalid fields: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Checkout with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment signature did not verify.
    #[error("Payment signature mismatch")]
    SignatureMismatch,

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The target user does not hold the required role.
    #[error("Only customers can use a cart")]
    RoleMismatch,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The cart changed while an order was being placed.
    #[error("Cart changed during checkout")]
    CartChanged,

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Payment processor call failed.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(#[from] PaymentError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingFields(fields) => Self::MissingField(fields),
            ServiceError::InvalidFields(fields) => Self::Invalid(fields),
            ServiceError::EmptyCart => Self::EmptyCart,
            ServiceError::SignatureMismatch => Self::SignatureMismatch,
            ServiceError::CartChanged => Self::CartChanged,
            ServiceError::RoleMismatch => Self::RoleMismatch,
            ServiceError::NotFound(what) => Self::NotFound(what.to_owned()),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::Payment(e) => Self::PaymentGateway(e),
            ServiceError::Repository(e) => Self::Database(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::Invalid(_)
            | Self::BadRequest(_)
            | Self::EmptyCart
            | Self::SignatureMismatch => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::RoleMismatch => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::CartChanged => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::MissingFields(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidRole(_)
                | AuthError::RoleInactive(_)
                | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::RoleMismatch => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists | AuthError::SeatLimitReached(_) => {
                    StatusCode::CONFLICT
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message and field errors. Server errors never expose
    /// internal details.
    fn body(&self) -> ErrorBody {
        let (message, errors) = match self {
            Self::MissingField(fields) => ("Missing required fields".to_owned(), fields.clone()),
            Self::Invalid(fields) => ("Invalid request".to_owned(), fields.clone()),
            Self::EmptyCart => ("Cart is empty".to_owned(), Vec::new()),
            Self::SignatureMismatch => ("Invalid payment signature".to_owned(), Vec::new()),
            Self::PaymentGateway(_) => ("Payment service unavailable".to_owned(), Vec::new()),
            Self::Auth(err) => match err {
                AuthError::MissingFields(fields) => {
                    ("Missing required fields".to_owned(), fields.clone())
                }
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    ("Invalid credentials".to_owned(), Vec::new())
                }
                AuthError::UserAlreadyExists => (
                    "An account with this email or mobile already exists".to_owned(),
                    Vec::new(),
                ),
                AuthError::InvalidEmail(_) => ("Invalid email address".to_owned(), Vec::new()),
                AuthError::WeakPassword(msg) => (msg.clone(), Vec::new()),
                AuthError::InvalidRole(e) => (e.to_string(), Vec::new()),
                AuthError::RoleMismatch => {
                    ("Role does not match this account".to_owned(), Vec::new())
                }
                AuthError::RoleInactive(_) | AuthError::SeatLimitReached(_) => {
                    (err.to_string(), Vec::new())
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    ("Internal server error".to_owned(), Vec::new())
                }
            },
            Self::Database(RepositoryError::NotFound) => ("Not found".to_owned(), Vec::new()),
            Self::Database(RepositoryError::Conflict(msg)) => (msg.clone(), Vec::new()),
            Self::Database(_) | Self::Internal(_) => {
                ("Internal server error".to_owned(), Vec::new())
            }
            _ => (self.to_string(), Vec::new()),
        };

        ErrorBody {
            success: false,
            message,
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercato_core::Role;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        let cases = [
            (AppError::MissingField(vec![]), StatusCode::BAD_REQUEST),
            (AppError::EmptyCart, StatusCode::BAD_REQUEST),
            (AppError::SignatureMismatch, StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::RoleMismatch, StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::CartChanged, StatusCode::CONFLICT),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::PaymentGateway(PaymentError::Request("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Database(RepositoryError::DataCorruption("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::SeatLimitReached(Role::Admin)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::WeakPassword("short".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Auth(AuthError::RoleMismatch).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_service_errors_convert() {
        assert!(matches!(
            AppError::from(ServiceError::CartChanged),
            AppError::CartChanged
        ));
        assert!(matches!(
            AppError::from(ServiceError::NotFound("product")),
            AppError::NotFound(what) if what == "product"
        ));
        assert!(matches!(
            AppError::from(ServiceError::Repository(RepositoryError::NotFound)),
            AppError::Database(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_fields_body_lists_each_field() {
        let (status, body) = body_json(AppError::MissingField(vec![
            "name is required".into(),
            "number is required".into(),
        ]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Missing required fields");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "orders.items is not an array".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("errors").is_none());
    }
}
