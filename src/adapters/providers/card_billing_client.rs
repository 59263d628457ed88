//! Card-billing provider read client.
//!
//! Lists a customer's subscriptions (any status) from
//! `GET {base}/v1/subscriptions?customer=..&status=all`, authenticating with
//! the secret API key as the basic-auth user.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::status_error;
use crate::domain::billing::CardSubscriptionRecord;
use crate::ports::{CardBillingReader, ProviderReadError};

pub struct CardBillingClient {
    api_key: Option<SecretString>,
    api_base_url: String,
    http_client: reqwest::Client,
}

impl CardBillingClient {
    pub fn new(api_key: Option<SecretString>, api_base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }
}

// ════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    #[serde(default)]
    data: Vec<WireSubscription>,
}

#[derive(Debug, Deserialize)]
struct WireSubscription {
    id: String,
    status: String,
    created: i64,
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    canceled_at: Option<i64>,
    #[serde(default)]
    items: Option<ItemList>,
    #[serde(default)]
    default_payment_method: Option<WirePaymentMethod>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    data: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    price: WirePrice,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    #[serde(default)]
    unit_amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    recurring: Option<WireRecurring>,
}

#[derive(Debug, Deserialize)]
struct WireRecurring {
    interval: String,
    #[serde(default)]
    interval_count: Option<i64>,
}

/// Either an expanded object or a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePaymentMethod {
    Expanded {
        #[serde(rename = "type")]
        kind: String,
    },
    Id(String),
}

impl From<WireSubscription> for CardSubscriptionRecord {
    fn from(sub: WireSubscription) -> Self {
        let price = sub
            .items
            .and_then(|items| items.data.into_iter().next())
            .map(|item| item.price);
        let (amount_minor, currency, nickname, recurring) = match price {
            Some(p) => (
                p.unit_amount.unwrap_or(0),
                p.currency,
                p.nickname,
                p.recurring,
            ),
            None => (0, None, None, None),
        };

        CardSubscriptionRecord {
            id: sub.id,
            status: sub.status,
            plan_name: nickname.or_else(|| sub.metadata.get("plan_name").cloned()),
            amount_minor,
            currency: currency
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| "BRL".to_string()),
            interval: recurring.as_ref().map(|r| r.interval.clone()),
            interval_count: recurring.and_then(|r| r.interval_count),
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            created: sub.created,
            cancel_at_period_end: sub.cancel_at_period_end,
            canceled_at: sub.canceled_at,
            payment_method: sub.default_payment_method.map(|pm| match pm {
                WirePaymentMethod::Expanded { kind } => kind,
                WirePaymentMethod::Id(_) => "card".to_string(),
            }),
        }
    }
}

fn decode(body: &str) -> Result<Vec<CardSubscriptionRecord>, ProviderReadError> {
    let list: SubscriptionList = serde_json::from_str(body)
        .map_err(|e| ProviderReadError::InvalidResponse(e.to_string()))?;
    Ok(list.data.into_iter().map(CardSubscriptionRecord::from).collect())
}

#[async_trait]
impl CardBillingReader for CardBillingClient {
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CardSubscriptionRecord>, ProviderReadError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderReadError::NotConfigured);
        };
        let url = format!("{}/v1/subscriptions", self.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(api_key.expose_secret(), Option::<&str>::None)
            .query(&[
                ("customer", customer_id),
                ("status", "all"),
                ("limit", "100"),
                ("expand[]", "data.default_payment_method"),
            ])
            .send()
            .await
            .map_err(|e| ProviderReadError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderReadError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, body));
        }

        decode(&body)
    }
}
