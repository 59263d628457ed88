//! Transaction record: one per provider order.
//!
//! At most one Transaction exists per `(provider, order_id)`; the document id
//! is derived from that pair. Later events for the same order may fill
//! missing identity fields and move `status`, nothing else. `raw_data` keeps
//! the first payload for manual reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::ResolvedIdentity;
use super::plan::PlanInterval;
use super::provider::Provider;
use super::webhook_event::EventKind;
use crate::domain::foundation::{MemberId, PartnerId, PartnerLinkId, Timestamp, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Refunded,
    Chargeback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub provider: Provider,
    pub order_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub installments: u32,
    pub paid_at: Timestamp,
    pub created_at: Timestamp,
    /// End of the billing period this payment bought.
    pub expires_at: Timestamp,
    pub plan_name: Option<String>,
    pub plan_interval: PlanInterval,
    pub plan_interval_count: u32,
    pub user_id: Option<MemberId>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
    pub status: TransactionStatus,
    pub last_event_kind: EventKind,
    pub raw_data: Value,
    pub updated_at: Timestamp,
}

/// Identity fields a later event may add to a known Transaction.
///
/// Serializes only the fields being set, so it can be sent as a partial
/// update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<MemberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<PartnerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_link_id: Option<PartnerLinkId>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.user_email.is_none()
            && self.partner_id.is_none()
            && self.partner_link_id.is_none()
    }
}

impl Transaction {
    /// Fields the resolved identity can supply that this record lacks.
    pub fn identity_gaps(&self, identity: &ResolvedIdentity) -> IdentityPatch {
        fn fill<T: Clone>(current: &Option<T>, incoming: &Option<T>) -> Option<T> {
            match current {
                Some(_) => None,
                None => incoming.clone(),
            }
        }

        // A link is only taken alongside the partner it belongs to.
        let same_partner = match (&self.partner_id, &identity.partner_id) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(stored), Some(incoming)) => stored == incoming,
        };

        IdentityPatch {
            user_id: fill(&self.user_id, &identity.user_id),
            user_email: fill(&self.user_email, &identity.user_email),
            partner_id: fill(&self.partner_id, &identity.partner_id),
            partner_link_id: if same_partner {
                fill(&self.partner_link_id, &identity.partner_link_id)
            } else {
                None
            },
        }
    }

    /// Applies a patch. Already-resolved fields are never overwritten.
    pub fn apply_identity(&mut self, patch: &IdentityPatch, now: Timestamp) {
        if self.user_id.is_none() {
            self.user_id = patch.user_id.clone();
        }
        if self.user_email.is_none() {
            self.user_email = patch.user_email.clone();
        }
        if self.partner_id.is_none() {
            self.partner_id = patch.partner_id.clone();
        }
        if self.partner_link_id.is_none() {
            self.partner_link_id = patch.partner_link_id.clone();
        }
        self.updated_at = now;
    }

    /// Records a later event kind for the same order.
    pub fn record_event(&mut self, kind: EventKind, now: Timestamp) {
        if kind.transaction_status() != TransactionStatus::Active {
            self.status = kind.transaction_status();
        }
        self.last_event_kind = kind;
        self.updated_at = now;
    }

    /// Identity as stored on this record.
    pub fn identity(&self) -> ResolvedIdentity {
        ResolvedIdentity {
            user_id: self.user_id.clone(),
            user_email: self.user_email.clone(),
            partner_id: self.partner_id.clone(),
            partner_link_id: self.partner_link_id.clone(),
            partner_source: None,
        }
    }
}
