//! SubscriptionLifecycle - drives the subscription state machine for one
//! payment event.
//!
//! Activation updates the live record for (member, partner, provider) in
//! place or starts a new one. Cancel and expire fan out to every matching
//! non-terminal record; each write is independent and a failure on one
//! record never blocks its siblings.

use futures::future::join_all;
use std::sync::Arc;

use crate::domain::billing::{
    BillingPeriod, CancelReason, CancelScope, Provider, Subscription, SubscriptionTerms,
};
use crate::domain::foundation::{
    DomainError, MemberId, PartnerId, PartnerLinkId, StateMachine, SubscriptionId, Timestamp,
};
use crate::ports::{ReferralLinkStore, SubscriptionRepository};

/// Target state requested by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredStatus {
    Active {
        terms: SubscriptionTerms,
        period: BillingPeriod,
    },
    Canceled(CancelReason),
    Expired,
}

#[derive(Debug, Clone)]
pub struct TransitionCommand {
    pub member_id: MemberId,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
    pub provider: Provider,
    pub desired: DesiredStatus,
    pub order_id: Option<String>,
}

/// What happened to the subscription records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Created,
    Renewed,
    Canceled,
    Expired,
    /// Nothing matched, or every match was already terminal.
    NoOp,
}

impl TransitionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::Created => "created",
            TransitionAction::Renewed => "renewed",
            TransitionAction::Canceled => "canceled",
            TransitionAction::Expired => "expired",
            TransitionAction::NoOp => "no_op",
        }
    }
}

/// Aggregate result. Never all-or-nothing: check `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// First record successfully created or mutated.
    pub subscription_id: Option<SubscriptionId>,
    pub action: TransitionAction,
    pub succeeded: usize,
    pub failed: usize,
    /// Terminal records left untouched.
    pub skipped: usize,
    pub conversion_recorded: bool,
}

impl TransitionOutcome {
    fn no_op(skipped: usize) -> Self {
        Self {
            subscription_id: None,
            action: TransitionAction::NoOp,
            succeeded: 0,
            failed: 0,
            skipped,
            conversion_recorded: false,
        }
    }

    fn failed(action: TransitionAction) -> Self {
        Self {
            subscription_id: None,
            action,
            succeeded: 0,
            failed: 1,
            skipped: 0,
            conversion_recorded: false,
        }
    }
}

pub struct SubscriptionLifecycle {
    subscriptions: Arc<dyn SubscriptionRepository>,
    links: Arc<dyn ReferralLinkStore>,
    cancel_scope: CancelScope,
}

impl SubscriptionLifecycle {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        links: Arc<dyn ReferralLinkStore>,
        cancel_scope: CancelScope,
    ) -> Self {
        Self {
            subscriptions,
            links,
            cancel_scope,
        }
    }

    pub async fn apply(&self, cmd: TransitionCommand) -> TransitionOutcome {
        let now = Timestamp::now();
        match cmd.desired.clone() {
            DesiredStatus::Active { terms, period } => self.activate(&cmd, terms, period, now).await,
            DesiredStatus::Canceled(reason) => {
                self.terminate(&cmd, TransitionAction::Canceled, now, move |sub, order, at| {
                    sub.cancel(reason, order, at)
                })
                .await
            }
            DesiredStatus::Expired => {
                self.terminate(&cmd, TransitionAction::Expired, now, |sub, order, at| {
                    sub.expire(order, at)
                })
                .await
            }
        }
    }

    async fn activate(
        &self,
        cmd: &TransitionCommand,
        terms: SubscriptionTerms,
        period: BillingPeriod,
        now: Timestamp,
    ) -> TransitionOutcome {
        let records = match self
            .subscriptions
            .find_for_member(&cmd.member_id, cmd.provider, cmd.partner_id.as_ref())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(member_id = %cmd.member_id, error = %e, "Subscription lookup failed");
                return TransitionOutcome::failed(TransitionAction::Created);
            }
        };

        // Partner-less activations only ever touch partner-less records.
        let live = records
            .into_iter()
            .filter(|s| s.partner_id == cmd.partner_id)
            .find(|s| !s.status.is_terminal());

        match live {
            Some(mut subscription) => {
                let renewed = subscription
                    .renew(terms, period, cmd.order_id.clone(), now)
                    .map(|_| subscription);
                let result = match renewed {
                    Ok(subscription) => self
                        .subscriptions
                        .update(&subscription)
                        .await
                        .map(|_| subscription.id),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(id) => {
                        tracing::info!(subscription_id = %id, member_id = %cmd.member_id, "Subscription renewed");
                        TransitionOutcome {
                            subscription_id: Some(id),
                            action: TransitionAction::Renewed,
                            succeeded: 1,
                            failed: 0,
                            skipped: 0,
                            conversion_recorded: false,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(member_id = %cmd.member_id, error = %e, "Subscription renewal failed");
                        TransitionOutcome::failed(TransitionAction::Renewed)
                    }
                }
            }
            None => self.create(cmd, terms, period, now).await,
        }
    }

    async fn create(
        &self,
        cmd: &TransitionCommand,
        terms: SubscriptionTerms,
        period: BillingPeriod,
        now: Timestamp,
    ) -> TransitionOutcome {
        let subscription = Subscription::start(
            cmd.member_id.clone(),
            cmd.partner_id.clone(),
            cmd.partner_link_id.clone(),
            cmd.provider,
            terms,
            period,
            cmd.order_id.clone(),
            now,
        );

        if let Err(e) = self.subscriptions.insert(&subscription).await {
            tracing::warn!(member_id = %cmd.member_id, error = %e, "Subscription creation failed");
            return TransitionOutcome::failed(TransitionAction::Created);
        }
        tracing::info!(
            subscription_id = %subscription.id,
            member_id = %cmd.member_id,
            partner_id = ?cmd.partner_id,
            provider = %cmd.provider,
            "Subscription created"
        );

        let conversion_recorded = match &cmd.partner_link_id {
            Some(link) => match self.links.increment_conversions(link).await {
                Ok(total) => {
                    tracing::info!(partner_link_id = %link, conversions = total, "Referral conversion recorded");
                    true
                }
                Err(e) => {
                    tracing::warn!(partner_link_id = %link, error = %e, "Referral conversion increment failed");
                    false
                }
            },
            None => false,
        };

        TransitionOutcome {
            subscription_id: Some(subscription.id),
            action: TransitionAction::Created,
            succeeded: 1,
            failed: 0,
            skipped: 0,
            conversion_recorded,
        }
    }

    async fn terminate<F>(
        &self,
        cmd: &TransitionCommand,
        action: TransitionAction,
        now: Timestamp,
        transition: F,
    ) -> TransitionOutcome
    where
        F: Fn(&mut Subscription, Option<String>, Timestamp) -> Result<bool, DomainError>,
    {
        let records = match self
            .subscriptions
            .find_for_member(&cmd.member_id, cmd.provider, cmd.partner_id.as_ref())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(member_id = %cmd.member_id, error = %e, "Subscription lookup failed");
                return TransitionOutcome::failed(action);
            }
        };

        let in_scope: Vec<Subscription> = match (&cmd.partner_id, self.cancel_scope) {
            (None, CancelScope::PartnerScoped) => {
                records.into_iter().filter(|s| s.partner_id.is_none()).collect()
            }
            _ => records,
        };

        let mut skipped = 0;
        let mut targets = Vec::with_capacity(in_scope.len());
        for mut subscription in in_scope {
            match transition(&mut subscription, cmd.order_id.clone(), now) {
                Ok(true) => targets.push(subscription),
                Ok(false) => skipped += 1,
                Err(e) => {
                    tracing::warn!(subscription_id = %subscription.id, error = %e, "Transition rejected");
                    skipped += 1;
                }
            }
        }
        if targets.is_empty() {
            return TransitionOutcome::no_op(skipped);
        }

        let results = join_all(targets.iter().map(|s| self.subscriptions.update(s))).await;

        let mut outcome = TransitionOutcome {
            subscription_id: None,
            action,
            succeeded: 0,
            failed: 0,
            skipped,
            conversion_recorded: false,
        };
        for (subscription, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => {
                    outcome.succeeded += 1;
                    outcome.subscription_id.get_or_insert(subscription.id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        member_id = %cmd.member_id,
                        error = %e,
                        "Subscription update failed; continuing with siblings"
                    );
                }
            }
        }
        tracing::info!(
            member_id = %cmd.member_id,
            action = action.as_str(),
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Subscription fan-out applied"
        );
        outcome
    }
}
