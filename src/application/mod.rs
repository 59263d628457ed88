//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Webhook processing is the write side; the consolidated subscription list
//! is the read side.

pub mod handlers;

pub use handlers::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    IdempotencyGuard, IdentityResolver, ListSubscriptionsHandler, ListSubscriptionsQuery,
    ListSubscriptionsResult, RegisterCheckoutIntentCommand, RegisterCheckoutIntentHandler,
    RegisterCheckoutIntentResult, SubscriptionLifecycle,
};
