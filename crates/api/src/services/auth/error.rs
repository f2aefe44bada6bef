//! Authentication error types.

use thiserror::Error;

use mercato_core::Role;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Required registration or login fields were absent or blank.
    #[error("missing required fields: {}", .0.join("; "))]
    MissingFields(Vec<String>),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] mercato_core::EmailError),

    /// The requested role does not exist.
    #[error("invalid role: {0}")]
    InvalidRole(#[from] mercato_core::RoleError),

    /// The role exists but is disabled in reference data.
    #[error("role {0} is not open for registration")]
    RoleInactive(Role),

    /// Every seat for a capped role is taken.
    #[error("no seats left for role {0}")]
    SeatLimitReached(Role),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but holds a different role than the one given.
    #[error("role does not match this account")]
    RoleMismatch,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Email or mobile number already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
