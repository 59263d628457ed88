//! Subscription aggregate.
//!
//! One record per (member, partner, provider) lifecycle. A record that reached
//! `canceled` or `expired` is never brought back; reactivation starts a new
//! record.
//!
//! # Invariants
//!
//! - Status transitions follow [`SubscriptionStatus`]'s state machine
//! - `current_period_start <= current_period_end`
//! - Money is held in minor units

use serde::{Deserialize, Serialize};
use std::fmt;

use super::plan::{BillingPeriod, PlanCadence, PlanInterval};
use super::provider::Provider;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{
    DomainError, ErrorCode, MemberId, PartnerId, PartnerLinkId, StateMachine, SubscriptionId,
    Timestamp,
};

/// Why a subscription was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Member or provider canceled the plan.
    Canceled,
    Refund,
    Chargeback,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::Canceled => "canceled",
            CancelReason::Refund => "refund",
            CancelReason::Chargeback => "chargeback",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which records a cancel/expire event fans out to when the event carries no
/// partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelScope {
    /// Every record of the member on that provider.
    #[default]
    MemberWide,
    /// Only records without a partner.
    PartnerScoped,
}

/// Payment-derived fields merged into a subscription on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTerms {
    pub plan_name: Option<String>,
    pub cadence: PlanCadence,
    pub price_minor: i64,
    pub currency: String,
    pub price_id: Option<String>,
}

/// Subscription aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub member_id: MemberId,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
    pub provider: Provider,
    pub status: SubscriptionStatus,
    pub plan_name: Option<String>,
    pub plan_interval: PlanInterval,
    pub plan_interval_count: u32,
    pub price_minor: i64,
    pub currency: String,
    pub price_id: Option<String>,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub cancel_reason: Option<CancelReason>,
    pub canceled_at: Option<Timestamp>,
    pub expired_at: Option<Timestamp>,
    /// Last transaction order id that touched this record.
    pub order_id: Option<String>,
}

impl Subscription {
    /// Starts a fresh active subscription.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        member_id: MemberId,
        partner_id: Option<PartnerId>,
        partner_link_id: Option<PartnerLinkId>,
        provider: Provider,
        terms: SubscriptionTerms,
        period: BillingPeriod,
        order_id: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            member_id,
            partner_id,
            partner_link_id,
            provider,
            status: SubscriptionStatus::Active,
            plan_name: terms.plan_name,
            plan_interval: terms.cadence.interval,
            plan_interval_count: terms.cadence.count,
            price_minor: terms.price_minor,
            currency: terms.currency,
            price_id: terms.price_id,
            current_period_start: period.start,
            current_period_end: period.end,
            created_at: now,
            updated_at: now,
            cancel_reason: None,
            canceled_at: None,
            expired_at: None,
            order_id,
        }
    }

    /// Activates or renews in place, merging payment-derived fields.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the record is already terminal.
    pub fn renew(
        &mut self,
        terms: SubscriptionTerms,
        period: BillingPeriod,
        order_id: Option<String>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        if terms.plan_name.is_some() {
            self.plan_name = terms.plan_name;
        }
        if terms.price_id.is_some() {
            self.price_id = terms.price_id;
        }
        if terms.price_minor > 0 {
            self.price_minor = terms.price_minor;
            self.currency = terms.currency;
        }
        self.plan_interval = terms.cadence.interval;
        self.plan_interval_count = terms.cadence.count;
        self.current_period_start = period.start;
        self.current_period_end = period.end;
        if order_id.is_some() {
            self.order_id = order_id;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the record.
    ///
    /// Returns `Ok(false)` without touching anything when the record is
    /// already terminal.
    pub fn cancel(
        &mut self,
        reason: CancelReason,
        order_id: Option<String>,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        if self.status.is_terminal() {
            return Ok(false);
        }
        self.transition_to(SubscriptionStatus::Canceled)?;
        self.cancel_reason = Some(reason);
        self.canceled_at = Some(now);
        if order_id.is_some() {
            self.order_id = order_id;
        }
        self.updated_at = now;
        Ok(true)
    }

    /// Expires the record. `Ok(false)` when already terminal.
    pub fn expire(&mut self, order_id: Option<String>, now: Timestamp) -> Result<bool, DomainError> {
        if self.status.is_terminal() {
            return Ok(false);
        }
        self.transition_to(SubscriptionStatus::Expired)?;
        self.expired_at = Some(now);
        if order_id.is_some() {
            self.order_id = order_id;
        }
        self.updated_at = now;
        Ok(true)
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription from {:?} to {:?}",
                    self.status, target
                ),
            )
            .with_detail("subscription_id", self.id.to_string())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::plan::period_for;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse_rfc3339(raw).unwrap()
    }

    fn terms(plan: &str, price: i64) -> SubscriptionTerms {
        SubscriptionTerms {
            plan_name: Some(plan.to_string()),
            cadence: PlanCadence::monthly(),
            price_minor: price,
            currency: "BRL".to_string(),
            price_id: None,
        }
    }

    fn started() -> Subscription {
        let paid_at = ts("2024-01-31T12:00:00Z");
        Subscription::start(
            MemberId::new("u-1").unwrap(),
            PartnerId::new("p-1").ok(),
            None,
            Provider::Checkout,
            terms("Gold", 2990),
            period_for(paid_at, PlanCadence::monthly()).unwrap(),
            Some("ORD-1".to_string()),
            paid_at,
        )
    }

    #[test]
    fn start_creates_active_record_with_period() {
        let sub = started();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, ts("2024-02-29T12:00:00Z"));
        assert_eq!(sub.order_id.as_deref(), Some("ORD-1"));
    }

    #[test]
    fn renew_merges_terms_and_moves_period() {
        let mut sub = started();
        let paid_at = ts("2024-02-29T12:00:00Z");
        let period = period_for(paid_at, PlanCadence::monthly()).unwrap();

        sub.renew(terms("Platinum", 4990), period, Some("ORD-2".into()), paid_at)
            .unwrap();

        assert_eq!(sub.plan_name.as_deref(), Some("Platinum"));
        assert_eq!(sub.price_minor, 4990);
        assert_eq!(sub.current_period_start, paid_at);
        assert_eq!(sub.order_id.as_deref(), Some("ORD-2"));
    }

    #[test]
    fn renew_keeps_known_fields_when_event_omits_them() {
        let mut sub = started();
        let empty = SubscriptionTerms {
            plan_name: None,
            cadence: PlanCadence::monthly(),
            price_minor: 0,
            currency: "BRL".into(),
            price_id: None,
        };
        let now = ts("2024-02-10T00:00:00Z");
        sub.renew(empty, period_for(now, PlanCadence::monthly()).unwrap(), None, now)
            .unwrap();
        assert_eq!(sub.plan_name.as_deref(), Some("Gold"));
        assert_eq!(sub.price_minor, 2990);
        assert_eq!(sub.order_id.as_deref(), Some("ORD-1"));
    }

    #[test]
    fn canceled_record_cannot_be_renewed_in_place() {
        let mut sub = started();
        sub.cancel(CancelReason::Canceled, None, Timestamp::now()).unwrap();

        let now = Timestamp::now();
        let err = sub
            .renew(terms("Gold", 2990), period_for(now, PlanCadence::monthly()).unwrap(), None, now)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn cancel_stamps_reason_once() {
        let mut sub = started();
        let first = ts("2024-02-01T00:00:00Z");
        assert!(sub.cancel(CancelReason::Refund, None, first).unwrap());
        assert_eq!(sub.cancel_reason, Some(CancelReason::Refund));

        let later = ts("2024-02-05T00:00:00Z");
        assert!(!sub.cancel(CancelReason::Chargeback, None, later).unwrap());
        assert_eq!(sub.cancel_reason, Some(CancelReason::Refund));
        assert_eq!(sub.updated_at, first);
    }

    #[test]
    fn expire_stamps_expired_at_and_skips_terminal() {
        let mut sub = started();
        let now = ts("2024-03-01T00:00:00Z");
        assert!(sub.expire(None, now).unwrap());
        assert_eq!(sub.expired_at, Some(now));
        assert!(!sub.expire(None, now).unwrap());
        assert!(!sub.cancel(CancelReason::Canceled, None, now).unwrap());
    }
}
