//! Billing handlers.
//!
//! ## Commands
//! - Handling provider payment webhooks
//! - Registering a checkout intent (pending identity hint)
//!
//! ## Queries
//! - Listing a member's consolidated subscriptions
//!
//! ## Building blocks
//! - `IdentityResolver` - member and partner attribution
//! - `IdempotencyGuard` - exactly-once Transaction records
//! - `SubscriptionLifecycle` - forward-only subscription transitions

mod apply_subscription_transition;
mod handle_payment_webhook;
mod idempotency_guard;
mod list_subscriptions;
mod register_checkout_intent;
mod resolve_identity;

#[cfg(test)]
pub(crate) mod test_support;

pub use apply_subscription_transition::{
    DesiredStatus, SubscriptionLifecycle, TransitionAction, TransitionCommand, TransitionOutcome,
};
pub use idempotency_guard::{GuardDecision, IdempotencyGuard};
pub use resolve_identity::IdentityResolver;

// Commands
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use register_checkout_intent::{
    RegisterCheckoutIntentCommand, RegisterCheckoutIntentHandler, RegisterCheckoutIntentResult,
};

// Queries
pub use list_subscriptions::{
    ListSubscriptionsHandler, ListSubscriptionsQuery, ListSubscriptionsResult,
};
