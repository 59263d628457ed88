//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::application::handlers::billing::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, ListSubscriptionsHandler,
    ListSubscriptionsQuery, RegisterCheckoutIntentCommand, RegisterCheckoutIntentHandler,
};
use crate::domain::billing::{BillingError, SIGNATURE_HEADER};
use crate::domain::foundation::{MemberId, PartnerId, PartnerLinkId};

use super::dto::{
    CheckoutIntentRequest, CheckoutIntentResponse, ErrorResponse, HealthResponse,
    SubscriptionListResponse, WebhookAckResponse, WebhookDiagnosticsQuery,
    WebhookDiagnosticsResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes. Cloned per request.
#[derive(Clone)]
pub struct BillingAppState {
    pub webhook_handler: Arc<HandlePaymentWebhookHandler>,
    pub list_subscriptions_handler: Arc<ListSubscriptionsHandler>,
    pub checkout_intent_handler: Arc<RegisterCheckoutIntentHandler>,
    /// Shared token the diagnostic GET can check, if configured.
    pub webhook_token: Option<Arc<SecretString>>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payment-events
pub async fn handle_payment_event(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    match state.webhook_handler.handle(cmd).await {
        Ok(result) => (StatusCode::OK, Json(WebhookAckResponse::from(&result))).into_response(),
        Err(err) => (err.status_code(), Json(WebhookAckResponse::error(err.to_string())))
            .into_response(),
    }
}

/// GET /webhooks/payment-events - reports configuration only.
pub async fn webhook_diagnostics(
    State(state): State<BillingAppState>,
    Query(query): Query<WebhookDiagnosticsQuery>,
) -> impl IntoResponse {
    let token_valid = query.token.as_deref().map(|candidate| match &state.webhook_token {
        Some(expected) => bool::from(
            candidate
                .as_bytes()
                .ct_eq(expected.expose_secret().as_bytes()),
        ),
        None => false,
    });

    Json(WebhookDiagnosticsResponse {
        provider: state.webhook_handler.provider(),
        signature_verification: state.webhook_handler.verifies_signatures(),
        token_configured: state.webhook_token.is_some(),
        token_valid,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Member Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /members/:member_id/subscriptions
pub async fn list_subscriptions(
    State(state): State<BillingAppState>,
    Path(member_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let query = ListSubscriptionsQuery {
        member_id: MemberId::new(member_id)?,
    };
    let result = state.list_subscriptions_handler.handle(query).await?;
    Ok(Json(SubscriptionListResponse::from(result)))
}

/// POST /members/:member_id/checkout-intents
pub async fn register_checkout_intent(
    State(state): State<BillingAppState>,
    Path(member_id): Path<String>,
    Json(request): Json<CheckoutIntentRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = RegisterCheckoutIntentCommand {
        member_id: MemberId::new(member_id)?,
        email: request.email,
        partner_id: PartnerId::parse_optional(request.partner_id.as_deref()),
        partner_link_id: PartnerLinkId::parse_optional(request.partner_link_id.as_deref()),
    };
    let result = state.checkout_intent_handler.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(CheckoutIntentResponse::from(result))))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::ValidationError> for BillingApiError {
    fn from(err: crate::domain::foundation::ValidationError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self.0,
                retryable = self.0.is_retryable(),
                "Billing request failed"
            );
        }
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
