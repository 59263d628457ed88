//! Payment provider credentials and endpoints

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;

/// Provider configuration
///
/// Every credential is optional. A missing webhook secret disables signature
/// checks; a missing API credential makes the matching read adapter report
/// itself as not configured.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// HMAC-SHA256 secret for `X-Webhook-Signature`
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,

    /// Shared token the checkout provider is configured with
    #[serde(default)]
    pub webhook_token: Option<SecretString>,

    /// Card-billing API key (basic auth user)
    #[serde(default)]
    pub card_api_key: Option<SecretString>,

    /// Card-billing API base URL
    #[serde(default = "default_card_api_base")]
    pub card_api_base: String,

    /// Checkout service API base URL
    #[serde(default)]
    pub checkout_api_base: Option<String>,

    /// Checkout service bearer token
    #[serde(default)]
    pub checkout_api_token: Option<SecretString>,

    /// Timeout for provider read calls in seconds
    #[serde(default = "default_provider_timeout")]
    pub request_timeout_secs: u64,
}

impl ProvidersConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_http_url(&self.card_api_base) {
            return Err(ValidationError::InvalidProviderUrl("card_api_base"));
        }
        if let Some(base) = &self.checkout_api_base {
            if !is_http_url(base) {
                return Err(ValidationError::InvalidProviderUrl("checkout_api_base"));
            }
        }
        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("https://") || raw.starts_with("http://")
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            webhook_token: None,
            card_api_key: None,
            card_api_base: default_card_api_base(),
            checkout_api_base: None,
            checkout_api_token: None,
            request_timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_card_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}
