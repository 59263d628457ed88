//! HTTP DTOs for billing endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{
    HandlePaymentWebhookResult, ListSubscriptionsResult, RegisterCheckoutIntentResult,
};
use crate::domain::billing::{Provider, SubscriptionView};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /members/:member_id/checkout-intents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutIntentRequest {
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub partner_link_id: Option<String>,
    /// Falls back to the member profile email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Query string of the diagnostic webhook GET.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookDiagnosticsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Every webhook response, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub status: String,
    pub message: String,
}

impl WebhookAckResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

impl From<&HandlePaymentWebhookResult> for WebhookAckResponse {
    fn from(result: &HandlePaymentWebhookResult) -> Self {
        Self {
            status: result.status().to_string(),
            message: result.message(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookDiagnosticsResponse {
    pub provider: Provider,
    pub signature_verification: bool,
    pub token_configured: bool,
    /// Only present when a `token` query parameter was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_valid: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionView>,
    pub active: Option<SubscriptionView>,
    pub degraded_providers: Vec<Provider>,
}

impl From<ListSubscriptionsResult> for SubscriptionListResponse {
    fn from(result: ListSubscriptionsResult) -> Self {
        Self {
            subscriptions: result.subscriptions,
            active: result.active,
            degraded_providers: result.degraded_providers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutIntentResponse {
    pub hint_id: String,
    pub partner_id: Option<String>,
    /// ISO 8601.
    pub expires_at: String,
}

impl From<RegisterCheckoutIntentResult> for CheckoutIntentResponse {
    fn from(result: RegisterCheckoutIntentResult) -> Self {
        Self {
            hint_id: result.hint_id.to_string(),
            partner_id: result.partner_id.map(|p| p.to_string()),
            expires_at: result.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Standard error response format for the REST endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{HintId, PartnerId, Timestamp, TransactionId};
    use crate::domain::billing::Disposition;

    #[test]
    fn checkout_intent_request_accepts_empty_body() {
        let req: CheckoutIntentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.partner_id.is_none());
        assert!(req.email.is_none());
    }

    #[test]
    fn duplicate_result_maps_to_ack() {
        let result = HandlePaymentWebhookResult::Duplicate {
            transaction_id: TransactionId::for_order("checkout", "ORD-1"),
            disposition: Disposition::Duplicate,
        };
        let ack = WebhookAckResponse::from(&result);
        assert_eq!(ack.status, "duplicate");
        assert!(ack.message.contains("checkout:ORD-1"));
    }

    #[test]
    fn diagnostics_omits_token_valid_when_not_checked() {
        let resp = WebhookDiagnosticsResponse {
            provider: Provider::Checkout,
            signature_verification: true,
            token_configured: false,
            token_valid: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["provider"], "checkout");
        assert!(json.get("token_valid").is_none());
    }

    #[test]
    fn checkout_intent_response_formats_expiry() {
        let resp = CheckoutIntentResponse::from(RegisterCheckoutIntentResult {
            hint_id: HintId::new(),
            partner_id: PartnerId::new("p-1").ok(),
            expires_at: Timestamp::parse_rfc3339("2024-01-01T01:00:00Z").unwrap(),
        });
        assert_eq!(resp.expires_at, "2024-01-01T01:00:00.000000Z");
        assert_eq!(resp.partner_id.as_deref(), Some("p-1"));
    }
}
