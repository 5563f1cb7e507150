//! Kickbox email verification signal
//!
//! Scores an email address with Kickbox's Sendex score (0.0-1.0).
//! `success: false` means Kickbox could not verify the address at all and
//! is reported as a failure, not as a zero score.

use crate::types::{ClientError, ValidationSignal};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for Kickbox requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Kickbox verification client
pub struct KickboxClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl KickboxClient {
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
impl ValidationSignal for KickboxClient {
    fn name(&self) -> &'static str {
        "Kickbox"
    }

    async fn validate(&self, attribute: &str) -> Result<f64, ClientError> {
        let url = format!("{}/v2/verify", self.base_url);
        debug!(email = %attribute, "Verifying email via Kickbox");

        let response = self
            .http_client
            .get(&url)
            .query(&[("email", attribute), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Kickbox request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: KickboxResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse Kickbox response: {}", e)))?;

        if !parsed.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: parsed
                    .message
                    .unwrap_or_else(|| "Kickbox verification unsuccessful".to_string()),
            });
        }

        let sendex = parsed
            .sendex
            .filter(|s| s.is_finite())
            .ok_or_else(|| ClientError::Parse("Kickbox response has no sendex score".to_string()))?;

        debug!(
            email = %attribute,
            sendex = sendex,
            result = parsed.result.as_deref().unwrap_or("unknown"),
            "Kickbox verification complete"
        );
        Ok(sendex)
    }
}

// ============================================================================
// Kickbox API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct KickboxResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    sendex: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}
