//! Billing reconciliation configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::{CancelScope, PartnerStrategy, Provider};
use crate::domain::foundation::PartnerId;

/// Settings for webhook reconciliation and identity resolution
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Partner attributed when nothing else resolves
    /// (`COUPON_CLUB__BILLING__DEFAULT_PARTNER_ID`)
    #[serde(default)]
    pub default_partner_id: Option<String>,

    /// Lifetime of checkout-time identity hints
    #[serde(default = "default_hint_ttl")]
    pub hint_ttl_minutes: i64,

    /// Fan-out of cancel/expire events that carry no partner
    #[serde(default)]
    pub cancel_scope: CancelScope,

    /// Ordered, comma-separated partner resolution strategies
    #[serde(default = "default_partner_strategies")]
    pub partner_strategies: String,

    /// Provider the inbound webhook endpoint belongs to
    #[serde(default = "default_webhook_provider")]
    pub webhook_provider: Provider,
}

impl BillingConfig {
    pub fn default_partner(&self) -> Option<PartnerId> {
        PartnerId::parse_optional(self.default_partner_id.as_deref())
    }

    /// Parsed strategy list.
    pub fn strategies(&self) -> Result<Vec<PartnerStrategy>, ValidationError> {
        PartnerStrategy::parse_list(&self.partner_strategies)
            .map_err(|e| ValidationError::InvalidPartnerStrategies(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=10_080).contains(&self.hint_ttl_minutes) {
            return Err(ValidationError::InvalidHintTtl);
        }
        self.strategies()?;
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_partner_id: None,
            hint_ttl_minutes: default_hint_ttl(),
            cancel_scope: CancelScope::default(),
            partner_strategies: default_partner_strategies(),
            webhook_provider: default_webhook_provider(),
        }
    }
}

fn default_hint_ttl() -> i64 {
    60
}

fn default_partner_strategies() -> String {
    "supplied,pending_hint,prior_transaction,link_access,default_partner".to_string()
}

fn default_webhook_provider() -> Provider {
    Provider::Checkout
}
