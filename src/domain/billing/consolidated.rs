//! Read-side merge of provider subscription records.
//!
//! Both providers are projected into [`SubscriptionView`], sorted active
//! first then newest first, and de-duplicated on `(provider, id)`.

use serde::Serialize;
use std::collections::HashSet;

use super::money::parse_minor_units;
use super::plan::{PlanCadence, PlanInterval};
use super::provider::Provider;
use super::provider_records::{
    CardSubscriptionRecord, CheckoutHistory, CheckoutPaymentRecord, CheckoutSubscriptionRecord,
};
use super::webhook_event::DEFAULT_CURRENCY;
use crate::domain::foundation::{Timestamp, ValidationError};

/// Provider-neutral subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Active,
    Trialing,
    PastDue,
    Pending,
    Canceled,
    Expired,
    Unknown,
}

/// Maps provider status vocabularies onto [`CanonicalStatus`].
pub fn normalize_status(raw: &str) -> CanonicalStatus {
    match raw.trim().to_lowercase().as_str() {
        "active" | "ativa" | "ativo" | "paid" | "approved" => CanonicalStatus::Active,
        "trialing" | "trial" | "em_teste" => CanonicalStatus::Trialing,
        "past_due" | "atrasada" | "atrasado" | "unpaid" | "overdue" => CanonicalStatus::PastDue,
        "pending" | "iniciada" | "aguardando" | "incomplete" | "started" => {
            CanonicalStatus::Pending
        }
        "canceled" | "cancelled" | "cancelada" | "cancelado" | "inactive" | "inativa" => {
            CanonicalStatus::Canceled
        }
        "expired" | "expirada" | "expirado" | "incomplete_expired" | "ended" => {
            CanonicalStatus::Expired
        }
        _ => CanonicalStatus::Unknown,
    }
}

/// One subscription in the merged billing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub id: String,
    pub provider: Provider,
    pub status: CanonicalStatus,
    pub plan_name: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: PlanInterval,
    pub interval_count: u32,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub created: Timestamp,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<Timestamp>,
    pub payment_method: Option<String>,
}

impl SubscriptionView {
    pub fn is_active(&self) -> bool {
        self.status == CanonicalStatus::Active
    }
}

fn cadence_or_monthly(interval: Option<&str>, count: Option<i64>) -> PlanCadence {
    interval
        .and_then(PlanInterval::parse)
        .and_then(|i| PlanCadence::new(i, count.unwrap_or(1)).ok())
        .unwrap_or_default()
}

/// Projects a card-billing record.
pub fn from_card(record: &CardSubscriptionRecord) -> Result<SubscriptionView, ValidationError> {
    let created = Timestamp::from_unix_secs(record.created)
        .ok_or_else(|| ValidationError::invalid_format("created", "timestamp out of range"))?;
    let cadence = cadence_or_monthly(record.interval.as_deref(), record.interval_count);

    Ok(SubscriptionView {
        id: record.id.clone(),
        provider: Provider::Card,
        status: normalize_status(&record.status),
        plan_name: record.plan_name.clone(),
        amount_minor: record.amount_minor,
        currency: record.currency.to_ascii_uppercase(),
        interval: cadence.interval,
        interval_count: cadence.count,
        current_period_start: record.current_period_start.and_then(Timestamp::from_unix_secs),
        current_period_end: record.current_period_end.and_then(Timestamp::from_unix_secs),
        created,
        cancel_at_period_end: record.cancel_at_period_end,
        canceled_at: record.canceled_at.and_then(Timestamp::from_unix_secs),
        payment_method: record.payment_method.clone(),
    })
}

/// Projects one checkout subscription, taking the payment method from the
/// latest matching payment.
pub fn from_checkout(
    record: &CheckoutSubscriptionRecord,
    payments: &[&CheckoutPaymentRecord],
) -> Result<SubscriptionView, ValidationError> {
    let parse_opt = |raw: &Option<String>| raw.as_deref().and_then(Timestamp::parse_lenient);

    let current_period_start = parse_opt(&record.current_period_start);
    let created = parse_opt(&record.created_at)
        .or(current_period_start)
        .ok_or_else(|| ValidationError::empty_field("created_at"))?;

    let cadence = match (record.interval.as_deref(), record.recurrence_months) {
        (Some(interval), _) if PlanInterval::parse(interval).is_some() => {
            cadence_or_monthly(Some(interval), record.interval_count)
        }
        (_, Some(months)) => PlanCadence::from_recurrence_months(months).unwrap_or_default(),
        _ => PlanCadence::monthly(),
    };

    let amount_minor = match record.amount.as_deref() {
        Some(raw) => parse_minor_units(raw)?,
        None => 0,
    };

    let payment_method = payments
        .iter()
        .filter(|p| p.payment_method.is_some())
        .max_by_key(|p| p.paid_at.as_deref().and_then(Timestamp::parse_lenient))
        .and_then(|p| p.payment_method.clone());

    Ok(SubscriptionView {
        id: record.id.clone(),
        provider: Provider::Checkout,
        status: normalize_status(&record.status),
        plan_name: record.plan_name.clone(),
        amount_minor,
        currency: record
            .currency
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        interval: cadence.interval,
        interval_count: cadence.count,
        current_period_start,
        current_period_end: parse_opt(&record.current_period_end),
        created,
        cancel_at_period_end: record.cancel_at_period_end,
        canceled_at: parse_opt(&record.canceled_at),
        payment_method,
    })
}

/// Projects a whole checkout history.
///
/// Payments are matched by subscription id. Payments without one are
/// attributed only when the history holds a single subscription.
pub fn project_checkout_history(
    history: &CheckoutHistory,
) -> Vec<Result<SubscriptionView, ValidationError>> {
    let single = history.subscriptions.len() == 1;
    history
        .subscriptions
        .iter()
        .map(|sub| {
            let payments: Vec<&CheckoutPaymentRecord> = history
                .payments
                .iter()
                .filter(|p| match p.subscription_id.as_deref() {
                    Some(id) => id == sub.id,
                    None => single,
                })
                .collect();
            from_checkout(sub, &payments)
        })
        .collect()
}

/// Orders and de-duplicates the merged list.
///
/// Active records first, then `created` descending. When the same
/// `(provider, id)` appears twice the better-ranked copy is kept.
pub fn consolidate(mut views: Vec<SubscriptionView>) -> Vec<SubscriptionView> {
    views.sort_by(|a, b| {
        b.is_active()
            .cmp(&a.is_active())
            .then_with(|| b.created.cmp(&a.created))
    });

    let mut seen = HashSet::new();
    views.retain(|v| seen.insert((v.provider, v.id.clone())));
    views
}

/// The subscription that grants access: first active record after sorting.
pub fn active_subscription(views: &[SubscriptionView]) -> Option<&SubscriptionView> {
    views.iter().find(|v| v.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, status: &str, created: i64) -> CardSubscriptionRecord {
        CardSubscriptionRecord {
            id: id.to_string(),
            status: status.to_string(),
            plan_name: Some("Gold".to_string()),
            amount_minor: 2990,
            currency: "brl".to_string(),
            interval: Some("month".to_string()),
            interval_count: Some(1),
            current_period_start: Some(created),
            current_period_end: Some(created + 30 * 86_400),
            created,
            cancel_at_period_end: false,
            canceled_at: None,
            payment_method: Some("card".to_string()),
        }
    }

    fn checkout(id: &str, status: &str, created_at: &str) -> CheckoutSubscriptionRecord {
        CheckoutSubscriptionRecord {
            id: id.to_string(),
            status: status.to_string(),
            plan_name: Some("Clube".to_string()),
            amount: Some("29.90".to_string()),
            currency: None,
            interval: None,
            interval_count: None,
            recurrence_months: Some(12),
            current_period_start: Some(created_at.to_string()),
            current_period_end: None,
            created_at: Some(created_at.to_string()),
            canceled_at: None,
            cancel_at_period_end: false,
        }
    }

    #[test]
    fn normalizes_provider_vocabularies() {
        assert_eq!(normalize_status("ativa"), CanonicalStatus::Active);
        assert_eq!(normalize_status("ACTIVE"), CanonicalStatus::Active);
        assert_eq!(normalize_status("iniciada"), CanonicalStatus::Pending);
        assert_eq!(normalize_status("cancelada"), CanonicalStatus::Canceled);
        assert_eq!(normalize_status("cancelled"), CanonicalStatus::Canceled);
        assert_eq!(normalize_status("past_due"), CanonicalStatus::PastDue);
        assert_eq!(normalize_status("incomplete_expired"), CanonicalStatus::Expired);
        assert_eq!(normalize_status("???"), CanonicalStatus::Unknown);
    }

    #[test]
    fn card_projection_converts_units() {
        let view = from_card(&card("sub_1", "active", 1_704_067_200)).unwrap();
        assert_eq!(view.provider, Provider::Card);
        assert_eq!(view.amount_minor, 2990);
        assert_eq!(view.currency, "BRL");
        assert_eq!(view.created, Timestamp::from_unix_secs(1_704_067_200).unwrap());
    }

    #[test]
    fn checkout_projection_parses_decimals_and_recurrence() {
        let view = from_checkout(&checkout("c-1", "ativa", "2024-01-10T00:00:00Z"), &[]).unwrap();
        assert_eq!(view.amount_minor, 2990);
        assert_eq!(view.interval, PlanInterval::Year);
        assert_eq!(view.status, CanonicalStatus::Active);
        assert_eq!(view.currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn checkout_projection_requires_some_creation_instant() {
        let mut record = checkout("c-1", "ativa", "2024-01-10T00:00:00Z");
        record.created_at = None;
        record.current_period_start = None;
        assert!(from_checkout(&record, &[]).is_err());
    }

    #[test]
    fn payment_method_comes_from_latest_matching_payment() {
        let history = CheckoutHistory {
            subscriptions: vec![
                checkout("c-1", "ativa", "2024-01-10T00:00:00Z"),
                checkout("c-2", "cancelada", "2023-01-10T00:00:00Z"),
            ],
            payments: vec![
                CheckoutPaymentRecord {
                    subscription_id: Some("c-1".into()),
                    payment_method: Some("boleto".into()),
                    paid_at: Some("2024-01-10T00:00:00Z".into()),
                    amount: None,
                    status: None,
                },
                CheckoutPaymentRecord {
                    subscription_id: Some("c-1".into()),
                    payment_method: Some("pix".into()),
                    paid_at: Some("2024-02-10T00:00:00Z".into()),
                    amount: None,
                    status: None,
                },
                CheckoutPaymentRecord {
                    subscription_id: None,
                    payment_method: Some("credit_card".into()),
                    paid_at: Some("2024-03-10T00:00:00Z".into()),
                    amount: None,
                    status: None,
                },
            ],
        };

        let views: Vec<_> = project_checkout_history(&history)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(views[0].payment_method.as_deref(), Some("pix"));
        assert_eq!(views[1].payment_method, None);
    }

    #[test]
    fn consolidation_orders_active_first_then_newest() {
        let t1 = 1_700_000_000;
        let t2 = 1_710_000_000;
        let t3 = 1_720_000_000;
        let mut views = vec![
            from_card(&card("a-active", "active", t3)).unwrap(),
            from_card(&card("a-canceled", "canceled", t1)).unwrap(),
        ];
        let t2_iso = Timestamp::from_unix_secs(t2).unwrap().to_rfc3339();
        views.push(from_checkout(&checkout("b-canceled", "cancelada", &t2_iso), &[]).unwrap());

        let merged = consolidate(views);
        let ids: Vec<&str> = merged.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a-active", "b-canceled", "a-canceled"]);
    }

    #[test]
    fn active_record_outranks_newer_canceled_one() {
        let merged = consolidate(vec![
            from_card(&card("new-canceled", "canceled", 1_720_000_000)).unwrap(),
            from_card(&card("old-active", "active", 1_600_000_000)).unwrap(),
        ]);
        assert_eq!(merged[0].id, "old-active");
        assert_eq!(active_subscription(&merged).unwrap().id, "old-active");
    }

    #[test]
    fn duplicates_are_removed_per_provider() {
        let merged = consolidate(vec![
            from_card(&card("sub_1", "canceled", 1_600_000_000)).unwrap(),
            from_card(&card("sub_1", "active", 1_600_000_000)).unwrap(),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_active());
    }

    #[test]
    fn same_id_on_different_providers_is_kept() {
        let iso = Timestamp::from_unix_secs(1_600_000_000).unwrap().to_rfc3339();
        let merged = consolidate(vec![
            from_card(&card("x", "active", 1_600_000_000)).unwrap(),
            from_checkout(&checkout("x", "ativa", &iso), &[]).unwrap(),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn no_active_record_means_unsubscribed() {
        let merged = consolidate(vec![
            from_card(&card("a", "canceled", 1_600_000_000)).unwrap(),
            from_card(&card("b", "expired", 1_610_000_000)).unwrap(),
            from_card(&card("c", "trialing", 1_620_000_000)).unwrap(),
        ]);
        assert!(active_subscription(&merged).is_none());
    }
}
