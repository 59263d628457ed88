//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    // Commands
    HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler,
    HandlePaymentWebhookResult,
    RegisterCheckoutIntentCommand,
    RegisterCheckoutIntentHandler,
    RegisterCheckoutIntentResult,
    // Queries
    ListSubscriptionsHandler,
    ListSubscriptionsQuery,
    ListSubscriptionsResult,
    // Building blocks
    IdempotencyGuard,
    IdentityResolver,
    SubscriptionLifecycle,
};
