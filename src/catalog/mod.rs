use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::Product;

// ============================================================================
// Product Catalog Client
// ============================================================================
//
// One bounded GET against the external catalog per verification. No retries:
// a product that cannot be confirmed in time counts as unavailable, and the
// caller decides what that means.
// ============================================================================

/// Why a verification produced no product. Collapsed to a single
/// caller-facing outcome upstream; the distinction only matters in logs.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("product does not exist in the catalog")]
    NotFound,

    #[error("catalog did not answer within {0:?}")]
    Timeout(Duration),

    #[error("could not reach the catalog: {0}")]
    Connect(String),

    #[error("catalog returned status {0}")]
    Status(u16),

    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProductVerifier: Send + Sync {
    /// Confirm `product_id` exists and fetch its descriptive fields.
    async fn verify(&self, product_id: &str) -> Result<Product, VerifyError>;
}

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ProductVerifier for CatalogClient {
    async fn verify(&self, product_id: &str) -> Result<Product, VerifyError> {
        let url = format!("{}/products/{}", self.base_url, product_id);

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifyError::Timeout(self.timeout)
                } else {
                    VerifyError::Connect(e.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(VerifyError::NotFound),
            status => return Err(VerifyError::Status(status.as_u16())),
        }

        response.json::<Product>().await.map_err(|e| {
            if e.is_timeout() {
                VerifyError::Timeout(self.timeout)
            } else {
                VerifyError::Decode(e.to_string())
            }
        })
    }
}
