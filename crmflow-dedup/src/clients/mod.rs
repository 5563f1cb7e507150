//! External service clients
//!
//! # Clients
//! 1. **hubspot** - Record store (contact search + merge)
//! 2. **abstractapi** - Email validation signal (`quality_score`)
//! 3. **kickbox** - Email validation signal (`sendex`)
//!
//! Each client receives its credentials at construction; none read the
//! environment themselves.

pub mod abstractapi;
pub mod hubspot;
pub mod kickbox;

pub use abstractapi::AbstractApiClient;
pub use hubspot::HubSpotClient;
pub use kickbox::KickboxClient;

use crate::config::{ValidationConfig, ValidationProvider};
use crate::types::{ClientError, ValidationSignal};
use std::sync::Arc;

/// Build the validation signal selected by configuration
pub fn build_validation_signal(
    config: &ValidationConfig,
    api_key: String,
) -> Result<Arc<dyn ValidationSignal>, ClientError> {
    let signal: Arc<dyn ValidationSignal> = match config.provider {
        ValidationProvider::AbstractApi => {
            Arc::new(AbstractApiClient::new(&config.abstractapi_url, api_key)?)
        }
        ValidationProvider::Kickbox => Arc::new(KickboxClient::new(&config.kickbox_url, api_key)?),
    };
    Ok(signal)
}
