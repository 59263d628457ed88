//! HandlePaymentWebhookHandler - entry point for provider payment events.
//!
//! Verify, parse, resolve identity, record the Transaction through the
//! idempotency guard, then drive the subscription lifecycle. Everything after
//! the Transaction write is best effort: the event is acknowledged as soon
//! as the Transaction is recorded.

use std::sync::Arc;

use super::apply_subscription_transition::{
    DesiredStatus, SubscriptionLifecycle, TransitionCommand, TransitionOutcome,
};
use super::idempotency_guard::IdempotencyGuard;
use super::resolve_identity::IdentityResolver;
use crate::domain::billing::{
    parse_webhook, period_for, BillingError, BillingPeriod, Disposition, EventIntent, EventKind,
    ParsedWebhook, PlanCadence, Provider, ResolutionIntent, ResolvedIdentity, SubscriptionTerms,
    Termination, Transaction, WebhookPayload, WebhookSignatureVerifier,
};
use crate::domain::foundation::{MemberId, Timestamp, TransactionId};

/// Command to handle one inbound webhook delivery.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// `X-Webhook-Signature` header value, if sent.
    pub signature: Option<String>,
}

/// Result of webhook processing. Every variant is a success for the
/// provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    /// Test/sandbox delivery; nothing recorded.
    Sandbox,
    /// Missing or unrecognised event type.
    Ignored { event_type: Option<String> },
    /// Known kind that carries no state change.
    Acknowledged { kind: EventKind },
    /// Order already recorded and this event changes nothing.
    Duplicate {
        transaction_id: TransactionId,
        disposition: Disposition,
    },
    /// Transaction recorded or updated; lifecycle outcome when it ran.
    Recorded {
        kind: EventKind,
        transaction_id: TransactionId,
        disposition: Disposition,
        member_id: Option<MemberId>,
        subscription: Option<TransitionOutcome>,
    },
}

impl HandlePaymentWebhookResult {
    pub fn status(&self) -> &'static str {
        match self {
            HandlePaymentWebhookResult::Sandbox | HandlePaymentWebhookResult::Ignored { .. } => {
                "ignored"
            }
            HandlePaymentWebhookResult::Duplicate { .. } => "duplicate",
            HandlePaymentWebhookResult::Acknowledged { .. }
            | HandlePaymentWebhookResult::Recorded { .. } => "ok",
        }
    }

    pub fn message(&self) -> String {
        match self {
            HandlePaymentWebhookResult::Sandbox => "Test event acknowledged".to_string(),
            HandlePaymentWebhookResult::Ignored { event_type } => format!(
                "Event type {} not handled",
                event_type.as_deref().unwrap_or("<missing>")
            ),
            HandlePaymentWebhookResult::Acknowledged { kind } => {
                format!("Event {} acknowledged", kind)
            }
            HandlePaymentWebhookResult::Duplicate {
                transaction_id,
                disposition,
            } => format!(
                "Transaction {} already recorded ({})",
                transaction_id,
                disposition.as_str()
            ),
            HandlePaymentWebhookResult::Recorded {
                kind,
                transaction_id,
                member_id,
                subscription,
                ..
            } => match (member_id, subscription) {
                (None, _) => format!(
                    "Transaction {} recorded for {}; member unresolved",
                    transaction_id, kind
                ),
                (Some(_), Some(outcome)) => format!(
                    "Transaction {} recorded for {}; subscription {}",
                    transaction_id,
                    kind,
                    outcome.action.as_str()
                ),
                (Some(_), None) => format!("Transaction {} recorded for {}", transaction_id, kind),
            },
        }
    }
}

/// Everything derived from one payload.
struct EventFacts {
    transaction: Transaction,
    terms: SubscriptionTerms,
    period: BillingPeriod,
}

pub struct HandlePaymentWebhookHandler {
    provider: Provider,
    verifier: Option<WebhookSignatureVerifier>,
    resolver: Arc<IdentityResolver>,
    guard: IdempotencyGuard,
    lifecycle: Arc<SubscriptionLifecycle>,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        provider: Provider,
        resolver: Arc<IdentityResolver>,
        guard: IdempotencyGuard,
        lifecycle: Arc<SubscriptionLifecycle>,
    ) -> Self {
        Self {
            provider,
            verifier: None,
            resolver,
            guard,
            lifecycle,
        }
    }

    /// Requires a valid `X-Webhook-Signature` on every delivery.
    pub fn with_verifier(mut self, verifier: Option<WebhookSignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verifier.is_some()
    }

    /// # Errors
    ///
    /// - `InvalidSignature` when verification is configured and fails
    /// - `MalformedPayload` when the body cannot be decoded
    /// - `TransactionStore` when the Transaction write fails
    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, BillingError> {
        if let Some(verifier) = &self.verifier {
            if let Err(e) = verifier.verify(&cmd.payload, cmd.signature.as_deref()) {
                tracing::warn!(provider = %self.provider, "Webhook signature rejected");
                return Err(e);
            }
        }

        let parsed = parse_webhook(&cmd.payload).map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "Malformed webhook payload");
            e
        })?;

        match parsed {
            ParsedWebhook::Sandbox { event_type } => {
                tracing::info!(event_type = ?event_type, "Sandbox webhook acknowledged");
                Ok(HandlePaymentWebhookResult::Sandbox)
            }
            ParsedWebhook::Unknown { event_type } => {
                tracing::info!(event_type = ?event_type, "Unhandled webhook event type");
                Ok(HandlePaymentWebhookResult::Ignored { event_type })
            }
            ParsedWebhook::Known { kind, payload } => self.process(kind, payload).await,
        }
    }

    async fn process(
        &self,
        kind: EventKind,
        payload: WebhookPayload,
    ) -> Result<HandlePaymentWebhookResult, BillingError> {
        let intent = kind.intent();
        let resolution = match intent {
            EventIntent::Acknowledge => {
                tracing::debug!(event_type = %kind, "Event acknowledged without side effects");
                return Ok(HandlePaymentWebhookResult::Acknowledged { kind });
            }
            EventIntent::Activate { .. } => ResolutionIntent::Activate,
            EventIntent::Terminate(_) => ResolutionIntent::Terminate,
        };

        let identity = self
            .resolver
            .resolve(&payload.identity_hints(), resolution)
            .await;
        let facts = self.extract(kind, &payload, &identity)?;
        if facts.transaction.id.is_unkeyed() {
            tracing::warn!(
                event_type = %kind,
                "Event carries no order id; recording without deduplication"
            );
        }

        let decision = self
            .guard
            .check_and_record(facts.transaction, kind, &identity)
            .await
            .map_err(|e| {
                tracing::error!(event_type = %kind, error = %e, "Transaction write failed");
                e
            })?;
        let transaction = decision.transaction.clone();
        let disposition = decision.disposition();

        if !decision.should_proceed() {
            tracing::debug!(
                order_id = ?transaction.order_id,
                event_type = %kind,
                disposition = disposition.as_str(),
                "Known order; nothing to drive"
            );
            return Ok(HandlePaymentWebhookResult::Duplicate {
                transaction_id: transaction.id,
                disposition,
            });
        }
        tracing::info!(
            order_id = ?transaction.order_id,
            event_type = %kind,
            disposition = disposition.as_str(),
            partner_source = identity.partner_source.map(|s| s.as_str()),
            "Transaction recorded"
        );

        let Some(member_id) = transaction.user_id.clone() else {
            tracing::warn!(
                order_id = ?transaction.order_id,
                event_type = %kind,
                "Member unresolved; subscription left untouched"
            );
            return Ok(HandlePaymentWebhookResult::Recorded {
                kind,
                transaction_id: transaction.id,
                disposition,
                member_id: None,
                subscription: None,
            });
        };

        let desired = match intent {
            EventIntent::Terminate(Termination::Cancel(reason)) => DesiredStatus::Canceled(reason),
            EventIntent::Terminate(Termination::Expire) => DesiredStatus::Expired,
            _ => DesiredStatus::Active {
                terms: facts.terms,
                period: facts.period,
            },
        };
        let outcome = self
            .lifecycle
            .apply(TransitionCommand {
                member_id: member_id.clone(),
                partner_id: transaction.partner_id.clone(),
                partner_link_id: transaction.partner_link_id.clone(),
                provider: self.provider,
                desired,
                order_id: transaction.order_id.clone(),
            })
            .await;
        if outcome.failed > 0 {
            tracing::warn!(
                member_id = %member_id,
                order_id = ?transaction.order_id,
                failed = outcome.failed,
                "Subscription transition partially failed"
            );
        }

        Ok(HandlePaymentWebhookResult::Recorded {
            kind,
            transaction_id: transaction.id,
            disposition,
            member_id: Some(member_id),
            subscription: Some(outcome),
        })
    }

    /// Builds the candidate Transaction and the subscription terms.
    ///
    /// Unparseable amounts and cadences degrade to zero and monthly; only a
    /// period that cannot be computed at all rejects the payload.
    fn extract(
        &self,
        kind: EventKind,
        payload: &WebhookPayload,
        identity: &ResolvedIdentity,
    ) -> Result<EventFacts, BillingError> {
        let now = Timestamp::now();
        let order_id = payload
            .order_id()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty());
        let id = match &order_id {
            Some(order) => TransactionId::for_order(self.provider.as_str(), order),
            None => TransactionId::unkeyed(),
        };

        let amount_minor = payload.amount_minor(self.provider).unwrap_or_else(|e| {
            tracing::warn!(order_id = ?order_id, error = %e, "Unparseable amount; recording zero");
            0
        });
        let cadence = payload.cadence().unwrap_or_else(|e| {
            tracing::warn!(order_id = ?order_id, error = %e, "Invalid plan cadence; assuming monthly");
            PlanCadence::monthly()
        });
        let paid_at = payload.paid_at().unwrap_or(now);
        let period = period_for(paid_at, cadence)
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        let terms = SubscriptionTerms {
            plan_name: payload.plan_name(),
            cadence,
            price_minor: amount_minor,
            currency: payload.currency(),
            price_id: payload.price_id(),
        };

        let transaction = Transaction {
            id,
            provider: self.provider,
            order_id,
            amount_minor,
            currency: terms.currency.clone(),
            payment_method: payload.payment_method(),
            installments: payload.installments(),
            paid_at,
            created_at: now,
            expires_at: period.end,
            plan_name: terms.plan_name.clone(),
            plan_interval: cadence.interval,
            plan_interval_count: cadence.count,
            user_id: identity.user_id.clone(),
            user_email: identity.user_email.clone(),
            user_name: payload.user_name(),
            partner_id: identity.partner_id.clone(),
            partner_link_id: identity.partner_link_id.clone(),
            status: kind.transaction_status(),
            last_event_kind: kind,
            raw_data: payload.raw.clone(),
            updated_at: now,
        };

        Ok(EventFacts {
            transaction,
            terms,
            period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Stores;
    use crate::application::handlers::billing::TransitionAction;
    use crate::domain::billing::{CancelReason, CancelScope, SubscriptionStatus, TransactionStatus};
    use crate::domain::foundation::PartnerId;
    use crate::ports::{SubscriptionRepository, TransactionRepository};
    use secrecy::SecretString;
    use serde_json::{json, Value};

    fn handler(stores: &Stores) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            Provider::Checkout,
            Arc::new(stores.resolver()),
            stores.guard(),
            Arc::new(stores.lifecycle(CancelScope::MemberWide)),
        )
    }

    fn event(kind: &str, order: Option<&str>, metadata: Value) -> Vec<u8> {
        let mut purchase = json!({
            "amount": "29.90",
            "currency": "brl",
            "payment_method": "pix",
            "paid_at": "2024-01-31T12:00:00Z"
        });
        if let Some(order) = order {
            purchase["id"] = json!(order);
        }
        json!({
            "event-type": kind,
            "buyer": {"email": "ana@example.com", "name": "Ana"},
            "purchase": purchase,
            "product": {"id": "prod-gold", "name": "Gold"},
            "subscription": {"interval": "month", "interval_count": 1},
            "metadata": metadata
        })
        .to_string()
        .into_bytes()
    }

    fn cmd(payload: Vec<u8>) -> HandlePaymentWebhookCommand {
        HandlePaymentWebhookCommand {
            payload,
            signature: None,
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // Short circuits
    // ════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn malformed_body_is_error() {
        let stores = Stores::new();
        let err = handler(&stores).handle(cmd(b"{not json".to_vec())).await.unwrap_err();
        assert!(matches!(err, BillingError::MalformedPayload(_)));
        assert_eq!(stores.store.count("transactions").await, 0);
    }

    #[tokio::test]
    async fn sandbox_and_unknown_have_no_side_effects() {
        let stores = Stores::new();
        let h = handler(&stores);

        let sandbox = json!({"event-type": "purchase.approved", "test": true, "purchase": {"id": "X"}});
        assert_eq!(
            h.handle(cmd(sandbox.to_string().into_bytes())).await.unwrap(),
            HandlePaymentWebhookResult::Sandbox
        );

        let unknown = h
            .handle(cmd(event("cart.abandoned", Some("X"), json!({}))))
            .await
            .unwrap();
        assert_eq!(unknown.status(), "ignored");

        let pending = h
            .handle(cmd(event("payment.pending", Some("X"), json!({}))))
            .await
            .unwrap();
        assert_eq!(
            pending,
            HandlePaymentWebhookResult::Acknowledged {
                kind: EventKind::PaymentPending
            }
        );
        assert_eq!(stores.store.count("transactions").await, 0);
    }

    #[tokio::test]
    async fn signature_required_when_configured() {
        let stores = Stores::new();
        let verifier = WebhookSignatureVerifier::new(SecretString::new("whsec".to_string()));
        let h = handler(&stores).with_verifier(Some(verifier.clone()));
        let body = event("purchase.approved", Some("ORD-1"), json!({"userId": "u-1"}));

        let err = h.handle(cmd(body.clone())).await.unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature));

        let signed = HandlePaymentWebhookCommand {
            signature: Some(verifier.sign(&body).unwrap()),
            payload: body,
        };
        assert!(h.handle(signed).await.is_ok());
    }

    // ════════════════════════════════════════════════════════════════════
    // Recording and lifecycle
    // ════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn approval_records_transaction_and_creates_subscription() {
        let stores = Stores::new();
        let h = handler(&stores);

        let result = h
            .handle(cmd(event(
                "purchase.approved",
                Some("ORD-1"),
                json!({"userId": "u-1", "partnerId": "p-1"}),
            )))
            .await
            .unwrap();
        let HandlePaymentWebhookResult::Recorded { subscription, .. } = &result else {
            panic!("expected Recorded, got {:?}", result);
        };
        assert_eq!(subscription.as_ref().unwrap().action, TransitionAction::Created);

        let tx = stores
            .transactions
            .find_by_id(&TransactionId::for_order("checkout", "ORD-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.amount_minor, 2990);
        assert_eq!(tx.currency, "BRL");
        assert_eq!(tx.partner_id.unwrap().as_str(), "p-1");
        assert_eq!(tx.expires_at, Timestamp::parse_rfc3339("2024-02-29T12:00:00Z").unwrap());
        assert_eq!(tx.raw_data["event-type"], "purchase.approved");
    }

    #[tokio::test]
    async fn replays_are_no_ops() {
        let stores = Stores::new();
        let h = handler(&stores);
        let body = event("purchase.approved", Some("ORD-1"), json!({"userId": "u-1"}));

        h.handle(cmd(body.clone())).await.unwrap();
        for _ in 0..4 {
            let result = h.handle(cmd(body.clone())).await.unwrap();
            assert_eq!(result.status(), "duplicate");
        }

        assert_eq!(stores.store.count("transactions").await, 1);
        assert_eq!(stores.store.count("subscriptions").await, 1);
    }

    #[tokio::test]
    async fn unresolved_member_still_records_transaction() {
        let stores = Stores::new();
        let body = json!({
            "event-type": "purchase.approved",
            "purchase": {"id": "ORD-1", "amount": 10}
        });

        let result = handler(&stores)
            .handle(cmd(body.to_string().into_bytes()))
            .await
            .unwrap();

        assert!(matches!(
            result,
            HandlePaymentWebhookResult::Recorded { member_id: None, subscription: None, .. }
        ));
        assert_eq!(result.status(), "ok");
        assert_eq!(stores.store.count("transactions").await, 1);
        assert_eq!(stores.store.count("subscriptions").await, 0);
    }

    #[tokio::test]
    async fn missing_order_id_records_every_delivery() {
        let stores = Stores::new();
        let h = handler(&stores);
        let body = event("purchase.approved", None, json!({"userId": "u-1"}));

        h.handle(cmd(body.clone())).await.unwrap();
        h.handle(cmd(body)).await.unwrap();

        assert_eq!(stores.store.count("transactions").await, 2);
        // Second activation renews the same record.
        assert_eq!(stores.store.count("subscriptions").await, 1);
    }

    #[tokio::test]
    async fn refund_cancels_and_marks_transaction() {
        let stores = Stores::new();
        let h = handler(&stores);
        let meta = json!({"userId": "u-1", "partnerId": "p-1"});
        h.handle(cmd(event("purchase.approved", Some("ORD-1"), meta.clone())))
            .await
            .unwrap();

        h.handle(cmd(event("purchase.refunded", Some("ORD-1"), meta)))
            .await
            .unwrap();

        let tx = stores
            .transactions
            .find_by_id(&TransactionId::for_order("checkout", "ORD-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Refunded);

        let subs = stores
            .subscriptions
            .find_by_member(&MemberId::new("u-1").unwrap())
            .await
            .unwrap();
        assert_eq!(subs[0].status, SubscriptionStatus::Canceled);
        assert_eq!(subs[0].cancel_reason, Some(CancelReason::Refund));
    }

    #[tokio::test]
    async fn late_confirmation_after_refund_keeps_access_revoked() {
        let stores = Stores::new();
        let h = handler(&stores);
        let meta = json!({"userId": "u-1", "partnerId": "p-1"});
        for kind in ["order.confirmed", "purchase.refunded"] {
            h.handle(cmd(event(kind, Some("ORD-1"), meta.clone())))
                .await
                .unwrap();
        }

        let result = h
            .handle(cmd(event("order.confirmed", Some("ORD-1"), meta)))
            .await
            .unwrap();
        assert_eq!(result.status(), "duplicate");

        let subs = stores
            .subscriptions
            .find_by_member(&MemberId::new("u-1").unwrap())
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].status, SubscriptionStatus::Canceled);

        let tx = stores
            .transactions
            .find_by_id(&TransactionId::for_order("checkout", "ORD-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Refunded);
    }

    #[tokio::test]
    async fn cancel_never_uses_default_partner() {
        let stores = Stores::new();
        let resolver = stores
            .resolver()
            .with_default_partner(PartnerId::new("p-house").ok());
        let h = HandlePaymentWebhookHandler::new(
            Provider::Checkout,
            Arc::new(resolver),
            stores.guard(),
            Arc::new(stores.lifecycle(CancelScope::MemberWide)),
        );

        h.handle(cmd(event("subscription.canceled", Some("ORD-9"), json!({"userId": "u-1"}))))
            .await
            .unwrap();

        let tx = stores
            .transactions
            .find_by_id(&TransactionId::for_order("checkout", "ORD-9"))
            .await
            .unwrap()
            .unwrap();
        assert!(tx.partner_id.is_none());
    }

    #[tokio::test]
    async fn confirmation_creates_subscription_for_known_order() {
        let stores = Stores::new();
        let h = handler(&stores);

        // First sighting without a resolvable member.
        h.handle(cmd(event("purchase.approved", Some("ORD-1"), json!({}))))
            .await
            .unwrap();
        assert_eq!(stores.store.count("subscriptions").await, 0);

        let result = h
            .handle(cmd(event("order.confirmed", Some("ORD-1"), json!({"userId": "u-1"}))))
            .await
            .unwrap();
        assert!(matches!(
            result,
            HandlePaymentWebhookResult::Recorded {
                disposition: Disposition::Confirmation,
                ..
            }
        ));
        let subs = stores
            .subscriptions
            .find_for_member(&MemberId::new("u-1").unwrap(), Provider::Checkout, None)
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
    }
}
