//! Authentication service.
//!
//! Password registration and login. Roles come from the reference registry:
//! a role can only be chosen at registration while its `roles` item is
//! active, and capped roles are limited to their seat count.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use tracing::{info, instrument};

use mercato_core::{Email, ReferenceCategoryKind, Role, UserId};

use super::required;
use crate::db::{ReferenceStore, RepositoryError, UserStore};
use crate::models::{LoginKey, NewUser, User, UserSummary};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Login request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    reference: &'a dyn ReferenceStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore, reference: &'a dyn ReferenceStore) -> Self {
        Self { users, reference }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` naming every blank required field.
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidRole` for
    /// malformed values, `AuthError::RoleInactive` when the role is switched
    /// off in reference data, `AuthError::SeatLimitReached` when a capped
    /// role is full, `AuthError::WeakPassword` for short passwords, and
    /// `AuthError::UserAlreadyExists` for a duplicate email or mobile.
    #[instrument(skip(self, form))]
    pub async fn register(&self, form: RegisterForm) -> Result<User, AuthError> {
        let mut missing = Vec::new();
        let name = required("name", form.name.as_deref(), &mut missing);
        let email = required("email", form.email.as_deref(), &mut missing);
        let password = required("password", form.password.as_deref(), &mut missing);
        let role = required("role", form.role.as_deref(), &mut missing);
        let (Some(name), Some(email), Some(password), Some(role)) = (name, email, password, role)
        else {
            return Err(AuthError::MissingFields(missing));
        };

        let email = Email::parse(email)?;
        let role: Role = role.parse()?;
        validate_password(password)?;

        self.ensure_role_open(role).await?;
        if let Some(limit) = role.seat_limit()
            && self.users.count_with_role(role).await? >= limit
        {
            return Err(AuthError::SeatLimitReached(role));
        }

        let password_hash = hash_password(password)?;
        let mobile = non_blank(form.mobile.as_deref()).map(str::to_owned);

        let user = self
            .users
            .create(NewUser {
                name: name.to_owned(),
                email,
                mobile,
                role,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, role = %user.role, "Account registered");
        Ok(user)
    }

    /// Authenticate with email or mobile, password, and the expected role.
    ///
    /// When both email and mobile are given they must name the same account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` when neither email nor mobile is
    /// given or the password or role is blank, `AuthError::InvalidCredentials`
    /// if no account matches or the password is wrong, and
    /// `AuthError::RoleMismatch` when the account holds a different role.
    #[instrument(skip(self, form))]
    pub async fn login(&self, form: LoginForm) -> Result<User, AuthError> {
        let mut missing = Vec::new();
        let email = non_blank(form.email.as_deref());
        let mobile = non_blank(form.mobile.as_deref());
        if email.is_none() && mobile.is_none() {
            missing.push("email or mobile is required".to_owned());
        }
        let password = required("password", form.password.as_deref(), &mut missing);
        let role = required("role", form.role.as_deref(), &mut missing);
        let (Some(password), Some(role), true) = (password, role, missing.is_empty()) else {
            return Err(AuthError::MissingFields(missing));
        };

        let email = email
            .map(Email::parse)
            .transpose()
            .map_err(|_| AuthError::InvalidCredentials)?;
        let key = match (&email, mobile) {
            (Some(email), Some(mobile)) => LoginKey::EmailAndMobile(email, mobile),
            (Some(email), None) => LoginKey::Email(email),
            (None, Some(mobile)) => LoginKey::Mobile(mobile),
            (None, None) => return Err(AuthError::InvalidCredentials),
        };

        let (user, hash) = self
            .users
            .find_credentials(key)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &hash)?;
        if role.parse::<Role>().ok() != Some(user.role) {
            return Err(AuthError::RoleMismatch);
        }
        Ok(user)
    }

    /// Every live account, without addresses or credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AuthError> {
        let users = self.users.list().await?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// A role is open unless the `roles` category exists and does not list
    /// it as active. Before the registry is seeded every role is open.
    async fn ensure_role_open(&self, role: Role) -> Result<(), AuthError> {
        match self.reference.find(ReferenceCategoryKind::Roles).await? {
            Some(roles) if !roles.grants_role(role) => Err(AuthError::RoleInactive(role)),
            _ => Ok(()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
