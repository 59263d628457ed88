//! Checkout service read client.
//!
//! `GET {base}/members/{member_id}/history?email=..` with a bearer token.
//! The response is untrusted: records that fail to decode are dropped with a
//! warning instead of failing the whole history.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::status_error;
use crate::domain::billing::CheckoutHistory;
use crate::domain::foundation::MemberId;
use crate::ports::{CheckoutReader, ProviderReadError};

pub struct CheckoutClient {
    api_base_url: Option<String>,
    api_token: Option<SecretString>,
    http_client: reqwest::Client,
}

impl CheckoutClient {
    pub fn new(
        api_base_url: Option<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            api_base_url: api_base_url.map(|u| u.trim_end_matches('/').to_string()),
            api_token,
            http_client,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawHistory {
    #[serde(default)]
    subscriptions: Vec<Value>,
    #[serde(default)]
    payments: Vec<Value>,
}

fn keep_valid<T: DeserializeOwned>(kind: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(record = kind, error = %e, "Dropping undecodable checkout record");
                None
            }
        })
        .collect()
}

fn decode(body: &str) -> Result<CheckoutHistory, ProviderReadError> {
    let raw: RawHistory = serde_json::from_str(body)
        .map_err(|e| ProviderReadError::InvalidResponse(e.to_string()))?;
    Ok(CheckoutHistory {
        subscriptions: keep_valid("subscription", raw.subscriptions),
        payments: keep_valid("payment", raw.payments),
    })
}

#[async_trait]
impl CheckoutReader for CheckoutClient {
    async fn history(
        &self,
        member_id: &MemberId,
        email: Option<&str>,
    ) -> Result<CheckoutHistory, ProviderReadError> {
        let (Some(base), Some(token)) = (&self.api_base_url, &self.api_token) else {
            return Err(ProviderReadError::NotConfigured);
        };
        let url = format!("{}/members/{}/history", base, member_id);

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(token.expose_secret());
        if let Some(email) = email {
            request = request.query(&[("email", email)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderReadError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(CheckoutHistory::default());
        }
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
