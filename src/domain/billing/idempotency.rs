//! Duplicate detection for payment events.
//!
//! Pure decision over "what do we already know about this order". The
//! application-layer guard performs the store reads and the compare-and-swap
//! insert around it.

use serde::Serialize;

use super::identity::ResolvedIdentity;
use super::transaction::{IdentityPatch, Transaction, TransactionStatus};
use super::webhook_event::EventKind;

/// How an incoming event relates to what is already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// First sighting of this order.
    New,
    /// No order id; cannot deduplicate, recorded as a fresh transaction.
    Unkeyed,
    /// Same event kind re-delivered.
    Duplicate,
    /// Explicit confirmation after a weaker, non-terminating event for the
    /// same order.
    Confirmation,
    /// Terminating event for a known order.
    StatusChange,
    /// Known order, different non-terminating kind; nothing to drive.
    Superseded,
}

impl Disposition {
    /// True when the subscription state machine should run for this event.
    pub fn drives_subscription(&self) -> bool {
        matches!(
            self,
            Disposition::New
                | Disposition::Unkeyed
                | Disposition::Confirmation
                | Disposition::StatusChange
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::New => "new",
            Disposition::Unkeyed => "unkeyed",
            Disposition::Duplicate => "duplicate",
            Disposition::Confirmation => "confirmation",
            Disposition::StatusChange => "status_change",
            Disposition::Superseded => "superseded",
        }
    }
}

/// Result of [`assess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub disposition: Disposition,
    pub should_create_new: bool,
    /// Missing identity fields the event can fill on the existing record.
    pub identity_patch: IdentityPatch,
}

impl Assessment {
    pub fn should_update_identity(&self) -> bool {
        !self.identity_patch.is_empty()
    }
}

/// Classifies an incoming event against the recorded transaction, if any.
///
/// `keyed` is false when the event carries no order id.
pub fn assess(
    existing: Option<&Transaction>,
    keyed: bool,
    incoming: EventKind,
    identity: &ResolvedIdentity,
) -> Assessment {
    let Some(existing) = existing.filter(|_| keyed) else {
        return Assessment {
            disposition: if keyed {
                Disposition::New
            } else {
                Disposition::Unkeyed
            },
            should_create_new: true,
            identity_patch: IdentityPatch::default(),
        };
    };

    let previous = existing.last_event_kind;
    // A terminated order never goes back to active, whatever arrives later.
    let still_live =
        !previous.is_termination() && existing.status == TransactionStatus::Active;
    let disposition = if incoming == previous {
        Disposition::Duplicate
    } else if incoming.is_confirmation() && !previous.is_confirmation() && still_live {
        Disposition::Confirmation
    } else if incoming.is_termination() {
        Disposition::StatusChange
    } else {
        Disposition::Superseded
    };

    Assessment {
        disposition,
        should_create_new: false,
        identity_patch: existing.identity_gaps(identity),
    }
}
