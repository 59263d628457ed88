//! ListSubscriptionsHandler - merged billing history across both providers.

use std::sync::Arc;

use crate::domain::billing::{
    active_subscription, consolidate, from_card, project_checkout_history, BillingError, Provider,
    SubscriptionView,
};
use crate::domain::foundation::MemberId;
use crate::ports::{CardBillingReader, CheckoutReader, MemberDirectory, ProviderReadError};

/// Query for a member's subscriptions.
#[derive(Debug, Clone)]
pub struct ListSubscriptionsQuery {
    pub member_id: MemberId,
}

/// Consolidated history plus the record granting access, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSubscriptionsResult {
    pub subscriptions: Vec<SubscriptionView>,
    pub active: Option<SubscriptionView>,
    /// Providers whose read failed; their records are missing from the list.
    pub degraded_providers: Vec<Provider>,
}

pub struct ListSubscriptionsHandler {
    members: Arc<dyn MemberDirectory>,
    card: Arc<dyn CardBillingReader>,
    checkout: Arc<dyn CheckoutReader>,
}

impl ListSubscriptionsHandler {
    pub fn new(
        members: Arc<dyn MemberDirectory>,
        card: Arc<dyn CardBillingReader>,
        checkout: Arc<dyn CheckoutReader>,
    ) -> Self {
        Self {
            members,
            card,
            checkout,
        }
    }

    pub async fn handle(
        &self,
        query: ListSubscriptionsQuery,
    ) -> Result<ListSubscriptionsResult, BillingError> {
        let member = self
            .members
            .find_by_id(&query.member_id)
            .await?
            .ok_or_else(|| BillingError::MemberNotFound(query.member_id.to_string()))?;

        let card_read = async {
            match member.card_customer_id.as_deref() {
                Some(customer) => self.card.list_subscriptions(customer).await,
                None => Ok(Vec::new()),
            }
        };
        let checkout_read = self.checkout.history(&member.id, member.email.as_deref());
        let (card, checkout) = tokio::join!(card_read, checkout_read);

        let mut views = Vec::new();
        let mut degraded_providers = Vec::new();

        match card {
            Ok(records) => {
                for record in &records {
                    match from_card(record) {
                        Ok(view) => views.push(view),
                        Err(e) => tracing::warn!(
                            member_id = %member.id,
                            subscription_id = %record.id,
                            error = %e,
                            "Skipping unreadable card subscription"
                        ),
                    }
                }
            }
            Err(e) => note_failure(&member.id, Provider::Card, e, &mut degraded_providers),
        }

        match checkout {
            Ok(history) => {
                for view in project_checkout_history(&history) {
                    match view {
                        Ok(view) => views.push(view),
                        Err(e) => tracing::warn!(
                            member_id = %member.id,
                            error = %e,
                            "Skipping unreadable checkout subscription"
                        ),
                    }
                }
            }
            Err(e) => note_failure(&member.id, Provider::Checkout, e, &mut degraded_providers),
        }

        let subscriptions = consolidate(views);
        let active = active_subscription(&subscriptions).cloned();
        tracing::debug!(
            member_id = %member.id,
            count = subscriptions.len(),
            has_active = active.is_some(),
            "Billing history consolidated"
        );

        Ok(ListSubscriptionsResult {
            subscriptions,
            active,
            degraded_providers,
        })
    }
}

fn note_failure(
    member_id: &MemberId,
    provider: Provider,
    error: ProviderReadError,
    degraded: &mut Vec<Provider>,
) {
    if error == ProviderReadError::NotConfigured {
        tracing::debug!(provider = %provider, "Provider not configured; skipped");
        return;
    }
    tracing::warn!(
        member_id = %member_id,
        provider = %provider,
        error = %error,
        "Provider read failed; returning partial history"
    );
    degraded.push(provider);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{
        CanonicalStatus, CardSubscriptionRecord, CheckoutHistory, CheckoutSubscriptionRecord,
    };
    use crate::domain::foundation::DomainError;
    use crate::ports::MemberProfile;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Members(Option<MemberProfile>);

    #[async_trait]
    impl MemberDirectory for Members {
        async fn find_by_id(&self, _id: &MemberId) -> Result<Option<MemberProfile>, DomainError> {
            Ok(self.0.clone())
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<MemberProfile>, DomainError> {
            Ok(self.0.clone())
        }
    }

    struct Card {
        result: Result<Vec<CardSubscriptionRecord>, ProviderReadError>,
        calls: Mutex<u32>,
    }

    impl Card {
        fn returning(result: Result<Vec<CardSubscriptionRecord>, ProviderReadError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl CardBillingReader for Card {
        async fn list_subscriptions(
            &self,
            _customer_id: &str,
        ) -> Result<Vec<CardSubscriptionRecord>, ProviderReadError> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    struct Checkout(Result<CheckoutHistory, ProviderReadError>);

    #[async_trait]
    impl CheckoutReader for Checkout {
        async fn history(
            &self,
            _member_id: &MemberId,
            _email: Option<&str>,
        ) -> Result<CheckoutHistory, ProviderReadError> {
            self.0.clone()
        }
    }

    fn member(card_customer: Option<&str>) -> MemberProfile {
        MemberProfile {
            id: MemberId::new("u-1").unwrap(),
            email: Some("ana@example.com".to_string()),
            name: None,
            card_customer_id: card_customer.map(str::to_string),
        }
    }

    fn card_record(id: &str, status: &str, created: i64) -> CardSubscriptionRecord {
        CardSubscriptionRecord {
            id: id.to_string(),
            status: status.to_string(),
            plan_name: Some("Gold".to_string()),
            amount_minor: 2990,
            currency: "brl".to_string(),
            interval: Some("month".to_string()),
            interval_count: Some(1),
            current_period_start: Some(created),
            current_period_end: None,
            created,
            cancel_at_period_end: false,
            canceled_at: None,
            payment_method: Some("card".to_string()),
        }
    }

    fn checkout_record(id: &str, status: &str, created_at: &str) -> CheckoutSubscriptionRecord {
        CheckoutSubscriptionRecord {
            id: id.to_string(),
            status: status.to_string(),
            plan_name: Some("Silver".to_string()),
            amount: Some("19.90".to_string()),
            currency: None,
            interval: None,
            interval_count: None,
            recurrence_months: Some(12),
            current_period_start: None,
            current_period_end: None,
            created_at: Some(created_at.to_string()),
            canceled_at: None,
            cancel_at_period_end: false,
        }
    }

    fn query() -> ListSubscriptionsQuery {
        ListSubscriptionsQuery {
            member_id: MemberId::new("u-1").unwrap(),
        }
    }

    #[tokio::test]
    async fn unknown_member_is_not_found() {
        let handler = ListSubscriptionsHandler::new(
            Arc::new(Members(None)),
            Card::returning(Ok(vec![])),
            Arc::new(Checkout(Ok(CheckoutHistory::default()))),
        );
        let err = handler.handle(query()).await.unwrap_err();
        assert!(matches!(err, BillingError::MemberNotFound(_)));
    }

    #[tokio::test]
    async fn merges_both_providers_active_first() {
        // t1 < t2 < t3
        let handler = ListSubscriptionsHandler::new(
            Arc::new(Members(Some(member(Some("cus_1"))))),
            Card::returning(Ok(vec![
                card_record("sub_old", "canceled", 1_700_000_000),
                card_record("sub_new", "active", 1_720_000_000),
            ])),
            Arc::new(Checkout(Ok(CheckoutHistory {
                subscriptions: vec![checkout_record("co_1", "cancelada", "2024-01-01T00:00:00Z")],
                payments: vec![],
            }))),
        );

        let result = handler.handle(query()).await.unwrap();

        let ids: Vec<&str> = result.subscriptions.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["sub_new", "co_1", "sub_old"]);
        assert_eq!(result.active.unwrap().id, "sub_new");
        assert!(result.degraded_providers.is_empty());
        assert_eq!(result.subscriptions[1].status, CanonicalStatus::Canceled);
        assert_eq!(result.subscriptions[1].interval_count, 1);
    }

    #[tokio::test]
    async fn failing_provider_degrades_instead_of_failing() {
        let handler = ListSubscriptionsHandler::new(
            Arc::new(Members(Some(member(Some("cus_1"))))),
            Card::returning(Err(ProviderReadError::Unavailable("timeout".into()))),
            Arc::new(Checkout(Ok(CheckoutHistory {
                subscriptions: vec![checkout_record("co_1", "ativa", "2024-01-01T00:00:00Z")],
                payments: vec![],
            }))),
        );

        let result = handler.handle(query()).await.unwrap();

        assert_eq!(result.subscriptions.len(), 1);
        assert_eq!(result.active.unwrap().provider, Provider::Checkout);
        assert_eq!(result.degraded_providers, vec![Provider::Card]);
    }

    #[tokio::test]
    async fn member_without_card_customer_skips_card_read() {
        let card = Card::returning(Ok(vec![card_record("sub_1", "active", 1_720_000_000)]));
        let handler = ListSubscriptionsHandler::new(
            Arc::new(Members(Some(member(None)))),
            card.clone(),
            Arc::new(Checkout(Err(ProviderReadError::NotConfigured))),
        );

        let result = handler.handle(query()).await.unwrap();

        assert_eq!(*card.calls.lock().unwrap(), 0);
        assert!(result.subscriptions.is_empty());
        assert!(result.active.is_none());
        assert!(result.degraded_providers.is_empty());
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped() {
        let mut broken = checkout_record("co_bad", "active", "not a date");
        broken.amount = Some("abc".to_string());
        let handler = ListSubscriptionsHandler::new(
            Arc::new(Members(Some(member(None)))),
            Card::returning(Ok(vec![])),
            Arc::new(Checkout(Ok(CheckoutHistory {
                subscriptions: vec![broken, checkout_record("co_ok", "active", "2024-02-01")],
                payments: vec![],
            }))),
        );

        let result = handler.handle(query()).await.unwrap();

        assert_eq!(result.subscriptions.len(), 1);
        assert_eq!(result.subscriptions[0].id, "co_ok");
    }
}
