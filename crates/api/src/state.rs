//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::Stores;
use crate::payments::{PaymentError, PaymentGateway, RazorpayClient, SignatureVerifier};
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::checkout::{CheckoutService, CheckoutSettings};
use crate::services::reference::ReferenceService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like stores, the payment gateway, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    stores: Stores,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    checkout: CheckoutSettings,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create the production state: `PostgreSQL` stores and the HTTPS
    /// payment client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let gateway = Arc::new(RazorpayClient::new(&config.payment)?);
        let stores = Stores::postgres(&pool);
        Ok(Self::from_parts(config, stores, gateway, Some(pool)))
    }

    /// Assemble state from explicit parts.
    ///
    /// `pool` is only used by the readiness check; without one the check
    /// reports ready.
    #[must_use]
    pub fn from_parts(
        config: ApiConfig,
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        pool: Option<PgPool>,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.payment.key_secret.clone());
        let checkout = CheckoutSettings::from_config(&config);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                gateway,
                verifier,
                checkout,
                pool,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get the store handles.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// Get the database pool, if the state is backed by one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.inner.stores.users.as_ref(),
            self.inner.stores.reference.as_ref(),
        )
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_> {
        CartService::new(&self.inner.stores, &self.inner.config)
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            &self.inner.stores,
            self.inner.gateway.as_ref(),
            &self.inner.verifier,
            &self.inner.checkout,
        )
    }

    #[must_use]
    pub fn reference(&self) -> ReferenceService<'_> {
        ReferenceService::new(self.inner.stores.reference.as_ref())
    }
}
