//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The
//! `tower_sessions.session` table is created by the accounts migration.
//! Session cookies are signed with a key derived from
//! `MERCATO_SESSION_SECRET`; a cookie with a bad signature starts a fresh
//! session.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ApiConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "mercato_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key for `secret`.
///
/// The key wants 64 bytes of material; SHA-512 of the secret gives exactly
/// that.
#[must_use]
pub fn cookie_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ApiConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.base_url.starts_with("https://"))
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(cookie_key(&config.session_secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_key_is_stable_per_secret() {
        let a = cookie_key(&SecretString::from("Zq8vN3mR7tK1wX5yB9cF2hJ6pL4sD0gA"));
        let again = cookie_key(&SecretString::from("Zq8vN3mR7tK1wX5yB9cF2hJ6pL4sD0gA"));
        let other = cookie_key(&SecretString::from("Hw4nB8xR2kT6yM0qV3cL7pJ1sG5dF9zE"));

        assert_eq!(a.master(), again.master());
        assert_ne!(a.master(), other.master());
        assert_eq!(a.master().len(), 64);
    }
}
