//! Configuration for crmflow-dedup
//!
//! Bootstrap settings come from `crmflow-dedup.toml`; every field has a
//! built-in default. Credentials resolve ENV → TOML.
//!
//! ```toml
//! [server]
//! port = 5790
//!
//! [hubspot]
//! access_token = "pat-..."
//! dedup_property = "phone"
//!
//! [validation]
//! provider = "abstractapi"   # or "kickbox"
//! abstractapi_key = "..."
//!
//! [pipeline]
//! scoring_concurrency = 4
//! call_timeout_ms = 10000
//! ```

use crmflow_common::config::{resolve_secret, LoggingConfig};
use crmflow_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Config file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "crmflow-dedup.toml";

/// Env var naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CRMFLOW_CONFIG";

pub const HUBSPOT_TOKEN_ENV_VAR: &str = "HUBSPOT_ACCESS_TOKEN";
pub const ABSTRACTAPI_KEY_ENV_VAR: &str = "ABSTRACTAPI_KEY";
pub const KICKBOX_KEY_ENV_VAR: &str = "KICKBOX_API_KEY";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hubspot: HubSpotConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

/// HubSpot record store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    #[serde(default = "default_hubspot_url")]
    pub base_url: String,
    /// Private app token; `HUBSPOT_ACCESS_TOKEN` overrides
    #[serde(default)]
    pub access_token: Option<String>,
    /// Contact property searched with the dedup key, and the event field it is read from
    #[serde(default = "default_dedup_property")]
    pub dedup_property: String,
    /// Contact property holding the attribute to validate
    #[serde(default = "default_secondary_property")]
    pub secondary_property: String,
    /// Maximum search result pages followed per run
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            base_url: default_hubspot_url(),
            access_token: None,
            dedup_property: default_dedup_property(),
            secondary_property: default_secondary_property(),
            max_pages: default_max_pages(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

fn default_hubspot_url() -> String {
    "https://api.hubapi.com".to_string()
}

fn default_dedup_property() -> String {
    "phone".to_string()
}

fn default_secondary_property() -> String {
    "email".to_string()
}

fn default_max_pages() -> u32 {
    10
}

fn default_requests_per_second() -> u32 {
    10
}

/// Which validation service scores candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationProvider {
    #[default]
    AbstractApi,
    Kickbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub provider: ValidationProvider,
    #[serde(default = "default_abstractapi_url")]
    pub abstractapi_url: String,
    #[serde(default)]
    pub abstractapi_key: Option<String>,
    #[serde(default = "default_kickbox_url")]
    pub kickbox_url: String,
    #[serde(default)]
    pub kickbox_key: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            provider: ValidationProvider::default(),
            abstractapi_url: default_abstractapi_url(),
            abstractapi_key: None,
            kickbox_url: default_kickbox_url(),
            kickbox_key: None,
        }
    }
}

fn default_abstractapi_url() -> String {
    "https://emailvalidation.abstractapi.com".to_string()
}

fn default_kickbox_url() -> String {
    "https://api.kickbox.com".to_string()
}

/// Pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum validation calls in flight per run
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
    /// Budget for each outbound call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring_concurrency: default_scoring_concurrency(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

fn default_scoring_concurrency() -> usize {
    4
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

/// Credentials after ENV → TOML resolution
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub hubspot_token: String,
    pub validation_key: String,
}

impl DedupConfig {
    /// Resolve the credentials needed by the configured providers
    pub fn resolve_credentials(&self) -> Result<ResolvedCredentials> {
        let hubspot_token = resolve_secret(
            "HubSpot access token",
            HUBSPOT_TOKEN_ENV_VAR,
            self.hubspot.access_token.as_deref(),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "HubSpot access token not configured. Set {} or [hubspot] access_token",
                HUBSPOT_TOKEN_ENV_VAR
            ))
        })?;

        let validation_key = match self.validation.provider {
            ValidationProvider::AbstractApi => resolve_secret(
                "AbstractAPI key",
                ABSTRACTAPI_KEY_ENV_VAR,
                self.validation.abstractapi_key.as_deref(),
            )
            .ok_or_else(|| {
                Error::Config(format!(
                    "AbstractAPI key not configured. Set {} or [validation] abstractapi_key",
                    ABSTRACTAPI_KEY_ENV_VAR
                ))
            })?,
            ValidationProvider::Kickbox => resolve_secret(
                "Kickbox API key",
                KICKBOX_KEY_ENV_VAR,
                self.validation.kickbox_key.as_deref(),
            )
            .ok_or_else(|| {
                Error::Config(format!(
                    "Kickbox API key not configured. Set {} or [validation] kickbox_key",
                    KICKBOX_KEY_ENV_VAR
                ))
            })?,
        };

        Ok(ResolvedCredentials {
            hubspot_token,
            validation_key,
        })
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.scoring_concurrency == 0 {
            return Err(Error::Config(
                "[pipeline] scoring_concurrency must be at least 1".to_string(),
            ));
        }
        if self.pipeline.call_timeout_ms == 0 {
            return Err(Error::Config(
                "[pipeline] call_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.hubspot.requests_per_second == 0 {
            return Err(Error::Config(
                "[hubspot] requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.hubspot.dedup_property.trim().is_empty() {
            return Err(Error::Config(
                "[hubspot] dedup_property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
