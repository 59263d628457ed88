//! HTTP adapter for billing endpoints.
//!
//! - `POST /webhooks/payment-events` - Provider payment events
//! - `GET /webhooks/payment-events` - Endpoint diagnostics (read-only)
//! - `GET /members/:member_id/subscriptions` - Consolidated billing history
//! - `POST /members/:member_id/checkout-intents` - Record checkout attribution
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingApiError, BillingAppState};
pub use routes::{billing_router, member_routes, webhook_routes};
