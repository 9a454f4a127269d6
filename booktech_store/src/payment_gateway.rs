use anyhow::Context;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PaymentGatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
}

/// Hosted checkout provider
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a gateway order for the amount and returns its id
    async fn create_order(
        &self,
        receipt: &str,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentGatewayError>;
}

#[derive(Serialize)]
struct GatewayOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

pub struct HttpPaymentGateway {
    url: String,
    key_id: String,
    key_secret: String,
    client: ClientWithMiddleware,
}

impl HttpPaymentGateway {
    pub fn new(url: &str, key_id: &str, key_secret: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            url: url.to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(
        &self,
        receipt: &str,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentGatewayError> {
        if self.key_id.is_empty() {
            return Err(PaymentGatewayError::Unavailable(
                "no gateway key configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&GatewayOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|err| PaymentGatewayError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentGatewayError::Unavailable(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentGatewayError::Rejected(format!("{} {}", status, body)));
        }

        let created: GatewayOrderResponse = response
            .json()
            .await
            .map_err(|err| PaymentGatewayError::Rejected(err.to_string()))?;
        Ok(created.id)
    }
}
