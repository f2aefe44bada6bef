//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERCATO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MERCATO_BASE_URL` - Public URL, used to build product image URLs
//! - `MERCATO_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `RAZORPAY_KEY_ID` - Payment processor key id (public, returned to clients)
//! - `RAZORPAY_KEY_SECRET` - Payment processor key secret (signs payments)
//!
//! ## Optional
//! - `MERCATO_HOST` - Bind address (default: 127.0.0.1)
//! - `MERCATO_PORT` - Listen port (default: 5000)
//! - `MERCATO_TAX_RATE` - Tax rate as a fraction (default: 0.18)
//! - `MERCATO_RETENTION_DAYS` - Days before soft-deleted rows are purged (default: 60)
//! - `MERCATO_LOG_JSON` - Emit JSON logs when set to `1` or `true`
//! - `RAZORPAY_API_BASE` - Processor API base URL (default: <https://api.razorpay.com>)
//! - `RAZORPAY_CURRENCY` - Order currency (default: INR)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use mercato_core::{Currency, TaxRate};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_RETENTION_DAYS: u32 = 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without a trailing slash
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Tax applied to order subtotals
    pub tax_rate: TaxRate,
    /// Age after which soft-deleted rows are purged
    pub retention_days: u32,
    /// Payment processor configuration
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

/// Payment processor configuration.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Public key id, handed to clients to open the payment widget
    pub key_id: String,
    /// Key secret, used for HTTP basic auth and signature verification
    pub key_secret: SecretString,
    /// Processor API base URL
    pub api_base: Url,
    /// Currency of created processor orders
    pub currency: Currency,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("currency", &self.currency)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MERCATO_DATABASE_URL")?;
        let host = parse_env("MERCATO_HOST", "127.0.0.1", |v| v.parse::<IpAddr>())?;
        let port = parse_env("MERCATO_PORT", "5000", |v| v.parse::<u16>())?;
        let base_url = get_required_env("MERCATO_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let session_secret = get_validated_secret("MERCATO_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "MERCATO_SESSION_SECRET")?;

        let tax_rate = parse_tax_rate(&get_env_or_default("MERCATO_TAX_RATE", "0.18"))
            .map_err(|e| ConfigError::InvalidEnvVar("MERCATO_TAX_RATE".to_string(), e))?;
        let retention_days = parse_env(
            "MERCATO_RETENTION_DAYS",
            &DEFAULT_RETENTION_DAYS.to_string(),
            |v| v.parse::<u32>(),
        )?;

        let payment = PaymentConfig::from_env()?;
        let log_json = get_optional_env("MERCATO_LOG_JSON")
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "TRUE"));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            tax_rate,
            retention_days,
            payment,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_json,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Public URL of an uploaded product image.
    #[must_use]
    pub fn product_image_url(&self, thumbnail: Option<&str>) -> String {
        match thumbnail.map(str::trim) {
            Some(name) if !name.is_empty() => {
                format!("{}/uploads/products/{name}", self.base_url)
            }
            _ => String::new(),
        }
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base = get_env_or_default("RAZORPAY_API_BASE", "https://api.razorpay.com");
        let api_base = Url::parse(&api_base)
            .map_err(|e| ConfigError::InvalidEnvVar("RAZORPAY_API_BASE".to_string(), e.to_string()))?;
        let currency = parse_env("RAZORPAY_CURRENCY", "INR", str::parse::<Currency>)?;

        Ok(Self {
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            api_base,
            currency,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
pub(crate) fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a variable (or its default) and parse it, naming the variable on failure.
fn parse_env<T, E, F>(key: &str, default: &str, parse: F) -> Result<T, ConfigError>
where
    E: std::fmt::Display,
    F: FnOnce(&str) -> Result<T, E>,
{
    let raw = get_env_or_default(key, default);
    parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_tax_rate(raw: &str) -> Result<TaxRate, String> {
    let fraction: Decimal = raw.trim().parse().map_err(|e| format!("{e}"))?;
    TaxRate::new(fraction).ok_or_else(|| format!("{fraction} is outside 0..=1"))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payment() -> PaymentConfig {
        PaymentConfig {
            key_id: "rzp_test_Kq81xQ2mB9".to_string(),
            key_secret: SecretString::from("very_private_key_secret_value"),
            api_base: Url::parse("https://api.razorpay.com").unwrap(),
            currency: Currency::INR,
        }
    }

    fn config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "https://shop.test".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            tax_rate: TaxRate::STANDARD,
            retention_days: 60,
            payment: payment(),
            sentry_dsn: None,
            sentry_environment: None,
            log_json: false,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-key-secret-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_parse_tax_rate() {
        assert_eq!(parse_tax_rate("0.18").unwrap(), TaxRate::STANDARD);
        assert!(parse_tax_rate("1.5").is_err());
        assert!(parse_tax_rate("eighteen").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_product_image_url() {
        let config = config();
        assert_eq!(
            config.product_image_url(Some("lamp.jpg")),
            "https://shop.test/uploads/products/lamp.jpg"
        );
        assert_eq!(config.product_image_url(Some("  ")), "");
        assert_eq!(config.product_image_url(None), "");
    }

    #[test]
    fn test_payment_config_debug_redacts_secret() {
        let debug_output = format!("{:?}", payment());
        assert!(debug_output.contains("rzp_test_Kq81xQ2mB9"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very_private_key_secret_value"));
    }
}
