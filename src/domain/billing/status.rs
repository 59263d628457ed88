//! Subscription status state machine.
//!
//! `pending`, `trial` and `inactive` are pre-activation states. `active` can
//! renew into itself. `canceled` and `expired` are terminal: a later
//! activation for the same member creates a fresh record instead.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle status of a stored subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created at checkout, awaiting the first confirmed payment.
    Pending,

    /// Provider-side trial; no payment collected yet.
    Trial,

    /// Paid and within the current period.
    Active,

    /// Terminated by cancellation, refund or chargeback.
    Canceled,

    /// Ran out without renewal.
    Expired,

    /// Imported or paused record that never became active.
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // Pre-activation states
            (Pending | Trial | Inactive, Active)
                | (Pending | Trial | Inactive, Canceled)
                | (Pending | Trial | Inactive, Expired)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, Canceled)
                | (Active, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending | Trial | Inactive => vec![Active, Canceled, Expired],
            Active => vec![Active, Canceled, Expired],
            Canceled | Expired => vec![],
        }
    }
}
