//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    handle_payment_event, health, list_subscriptions, register_checkout_intent,
    webhook_diagnostics, BillingAppState,
};

/// Provider-facing routes. No member auth; optionally signature verified.
///
/// - `POST /payment-events` - Handle a payment event
/// - `GET /payment-events` - Diagnostics, never touches the store
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route(
        "/payment-events",
        post(handle_payment_event).get(webhook_diagnostics),
    )
}

/// Member-facing routes.
///
/// - `GET /:member_id/subscriptions` - Consolidated billing history
/// - `POST /:member_id/checkout-intents` - Register checkout attribution
pub fn member_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/:member_id/subscriptions", get(list_subscriptions))
        .route("/:member_id/checkout-intents", post(register_checkout_intent))
}

/// Complete billing router, mounted at the root.
///
/// ```ignore
/// let app = billing_router().with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .nest("/members", member_routes())
        .route("/health", get(health))
}
