//! Provider read ports for the billing history view.
//!
//! Each provider can fail independently; the consolidator logs and carries
//! on with whatever the other one returned.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{CardSubscriptionRecord, CheckoutHistory};
use crate::domain::foundation::MemberId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderReadError {
    #[error("Provider not configured")]
    NotConfigured,

    #[error("Provider rejected credentials")]
    Unauthorized,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CardBillingReader: Send + Sync {
    /// All subscriptions of a card-billing customer, any status.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CardSubscriptionRecord>, ProviderReadError>;
}

#[async_trait]
pub trait CheckoutReader: Send + Sync {
    /// Subscriptions and payments for a member. The response is partial and
    /// untrusted.
    async fn history(
        &self,
        member_id: &MemberId,
        email: Option<&str>,
    ) -> Result<CheckoutHistory, ProviderReadError>;
}
