//! Billing domain - payment-event reconciliation and subscription state.
//!
//! Turns at-least-once provider webhooks into exactly-once Transaction
//! records and forward-only Subscription transitions, and merges the two
//! providers' subscription records into one history per member.

mod consolidated;
mod errors;
mod identity;
mod idempotency;
mod money;
mod plan;
mod provider;
mod provider_records;
mod signature;
mod status;
mod subscription;
mod transaction;
mod webhook_event;

pub use consolidated::{
    active_subscription, consolidate, from_card, from_checkout, normalize_status,
    project_checkout_history, CanonicalStatus, SubscriptionView,
};
pub use errors::BillingError;
pub use identity::{
    normalize_email, IdentityHints, PartnerStrategy, PendingIdentityHint, ResolutionIntent,
    ResolvedIdentity,
};
pub use idempotency::{assess, Assessment, Disposition};
pub use money::{decimal_value_to_minor, parse_minor_units};
pub use plan::{
    compute_period, period_for, BillingPeriod, PlanCadence, PlanInterval, MAX_INTERVAL_COUNT,
};
pub use provider::Provider;
pub use provider_records::{
    CardSubscriptionRecord, CheckoutHistory, CheckoutPaymentRecord, CheckoutSubscriptionRecord,
};
pub use signature::{WebhookSignatureVerifier, SIGNATURE_HEADER};
pub use status::SubscriptionStatus;
pub use subscription::{CancelReason, CancelScope, Subscription, SubscriptionTerms};
pub use transaction::{IdentityPatch, Transaction, TransactionStatus};
pub use webhook_event::{
    parse_webhook, BuyerPayload, EventIntent, EventKind, ParsedWebhook, ProductPayload,
    PurchasePayload, SubscriptionPayload, Termination, WebhookEnvelope, WebhookPayload,
    DEFAULT_CURRENCY,
};

#[cfg(test)]
pub(crate) use transaction::fixtures;
