//! AbstractAPI email validation signal
//!
//! Scores an email address with AbstractAPI's `quality_score` (0.0-1.0).
//!
//! # API Reference
//! - Endpoint: https://emailvalidation.abstractapi.com/v1/
//! - `quality_score` arrives as a decimal string (e.g. `"0.80"`), older
//!   responses use a bare number; both are accepted.

use crate::types::{ClientError, ValidationSignal};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default timeout for AbstractAPI requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// AbstractAPI email validation client
pub struct AbstractApiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl AbstractApiClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ValidationSignal for AbstractApiClient {
    fn name(&self) -> &'static str {
        "AbstractAPI"
    }

    async fn validate(&self, attribute: &str) -> Result<f64, ClientError> {
        let url = format!("{}/v1/", self.base_url);
        debug!(email = %attribute, "Validating email via AbstractAPI");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("email", attribute)])
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("AbstractAPI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AbstractApiResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse AbstractAPI response: {}", e)))?;

        let score = parsed
            .quality_score
            .as_ref()
            .and_then(parse_score)
            .ok_or_else(|| {
                ClientError::Parse("AbstractAPI response has no usable quality_score".to_string())
            })?;

        debug!(
            email = %attribute,
            quality_score = score,
            deliverability = parsed.deliverability.as_deref().unwrap_or("unknown"),
            "AbstractAPI validation complete"
        );
        Ok(score)
    }
}

// ============================================================================
// AbstractAPI Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct AbstractApiResponse {
    #[serde(default)]
    quality_score: Option<Value>,
    #[serde(default)]
    deliverability: Option<String>,
}

/// Accept `"0.80"` or `0.8`
fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}
