//! Raw subscription records as each provider reports them.
//!
//! The two providers disagree on units: card billing uses minor-unit integer
//! amounts and unix-second timestamps, the checkout service uses decimal
//! amounts and ISO strings. Conversion happens in the consolidated view.

use serde::{Deserialize, Serialize};

/// Subscription as listed by the card-billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSubscriptionRecord {
    pub id: String,
    pub status: String,
    pub plan_name: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub created: i64,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<i64>,
    pub payment_method: Option<String>,
}

/// Subscription as reported by the checkout service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSubscriptionRecord {
    pub id: String,
    pub status: String,
    pub plan_name: Option<String>,
    /// Decimal text, e.g. `"29.90"`.
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub recurrence_months: Option<i64>,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub created_at: Option<String>,
    pub canceled_at: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

/// One payment in the checkout service's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPaymentRecord {
    pub subscription_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<String>,
    pub amount: Option<String>,
    pub status: Option<String>,
}

/// Everything the checkout service returns for one member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutHistory {
    #[serde(default)]
    pub subscriptions: Vec<CheckoutSubscriptionRecord>,
    #[serde(default)]
    pub payments: Vec<CheckoutPaymentRecord>,
}
