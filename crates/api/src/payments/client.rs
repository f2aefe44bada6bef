//! Razorpay Orders API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, instrument};
use url::Url;

use super::error::PaymentError;
use super::types::{CreateOrderRequest, ErrorEnvelope, ProcessorOrder};
use super::PaymentGateway;
use crate::config::PaymentConfig;

/// Timeout for every processor call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTPS client for the processor's Orders API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    api_base: Url,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a client from payment configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            api_base: config.api_base.clone(),
        })
    }

    fn orders_url(&self) -> Result<Url, PaymentError> {
        self.api_base
            .join("/v1/orders")
            .map_err(|e| PaymentError::Request(e.to_string()))
    }

    fn order_url(&self, id: &str) -> Result<Url, PaymentError> {
        let mut url = self.orders_url()?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Request("api base cannot be a base url".to_owned()))?
            .push(id);
        Ok(url)
    }
}

/// Parse a processor order, turning non-2xx responses into `PaymentError::Api`.
async fn read_order(response: reqwest::Response) -> Result<ProcessorOrder, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .description
                .or(envelope.error.code)
                .unwrap_or_else(|| "Unknown error".to_string()),
            Err(_) => "Unknown error".to_string(),
        };
        error!(status = status.as_u16(), %message, "Payment processor rejected request");
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| PaymentError::Response(e.to_string()))
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<ProcessorOrder, PaymentError> {
        let response = self
            .client
            .post(self.orders_url()?)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let order = read_order(response).await?;
        debug!(processor_order_id = %order.id, "Processor order created");

        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_order(&self, id: &str) -> Result<ProcessorOrder, PaymentError> {
        let response = self
            .client
            .get(self.order_url(id)?)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        read_order(response).await
    }
}
