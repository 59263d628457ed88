//! Inbound payment-event envelope.
//!
//! Providers send loosely-typed JSON. The envelope is decoded once into
//! optional sub-objects, then classified into a closed [`EventKind`] so every
//! downstream `match` is exhaustive. Fields the schema does not know about
//! are kept in `extra`; the untouched JSON is kept for the audit trail.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::errors::BillingError;
use super::identity::IdentityHints;
use super::money::{decimal_value_to_minor, parse_minor_units};
use super::plan::{PlanCadence, PlanInterval};
use super::provider::Provider;
use super::subscription::CancelReason;
use super::transaction::TransactionStatus;
use crate::domain::foundation::{MemberId, PartnerId, PartnerLinkId, Timestamp, ValidationError};

/// Currency assumed when a payload omits it.
pub const DEFAULT_CURRENCY: &str = "BRL";

// ════════════════════════════════════════════════════════════════════
// Event kinds
// ════════════════════════════════════════════════════════════════════

/// Every event kind the dispatcher acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "purchase.approved")]
    PurchaseApproved,
    #[serde(rename = "order.confirmed")]
    OrderConfirmed,
    #[serde(rename = "request.confirmed")]
    RequestConfirmed,
    #[serde(rename = "product_access.started")]
    ProductAccessStarted,
    #[serde(rename = "subscription.renewed")]
    SubscriptionRenewed,
    #[serde(rename = "payment.pending")]
    PaymentPending,
    #[serde(rename = "subscription.canceled")]
    SubscriptionCanceled,
    #[serde(rename = "subscription.expired")]
    SubscriptionExpired,
    #[serde(rename = "product_access.ended")]
    ProductAccessEnded,
    #[serde(rename = "purchase.refunded")]
    PurchaseRefunded,
    #[serde(rename = "purchase.chargeback")]
    PurchaseChargeback,
}

/// How a terminating event ends a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Cancel(CancelReason),
    Expire,
}

/// What the dispatcher should do for an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIntent {
    /// Record the transaction and drive the subscription to `active`.
    Activate { confirmation: bool },
    /// Record the transaction and drive the subscription to a terminal state.
    Terminate(Termination),
    /// Acknowledge without side effects.
    Acknowledge,
}

impl EventKind {
    /// Case-insensitive lookup of a wire name.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_lowercase().as_str() {
            "purchase.approved" => EventKind::PurchaseApproved,
            "order.confirmed" => EventKind::OrderConfirmed,
            "request.confirmed" => EventKind::RequestConfirmed,
            "product_access.started" => EventKind::ProductAccessStarted,
            "subscription.renewed" => EventKind::SubscriptionRenewed,
            "payment.pending" => EventKind::PaymentPending,
            "subscription.canceled" | "subscription.cancelled" => EventKind::SubscriptionCanceled,
            "subscription.expired" => EventKind::SubscriptionExpired,
            "product_access.ended" => EventKind::ProductAccessEnded,
            "purchase.refunded" => EventKind::PurchaseRefunded,
            "purchase.chargeback" => EventKind::PurchaseChargeback,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PurchaseApproved => "purchase.approved",
            EventKind::OrderConfirmed => "order.confirmed",
            EventKind::RequestConfirmed => "request.confirmed",
            EventKind::ProductAccessStarted => "product_access.started",
            EventKind::SubscriptionRenewed => "subscription.renewed",
            EventKind::PaymentPending => "payment.pending",
            EventKind::SubscriptionCanceled => "subscription.canceled",
            EventKind::SubscriptionExpired => "subscription.expired",
            EventKind::ProductAccessEnded => "product_access.ended",
            EventKind::PurchaseRefunded => "purchase.refunded",
            EventKind::PurchaseChargeback => "purchase.chargeback",
        }
    }

    pub fn intent(&self) -> EventIntent {
        match self {
            EventKind::PurchaseApproved
            | EventKind::ProductAccessStarted
            | EventKind::SubscriptionRenewed => EventIntent::Activate {
                confirmation: false,
            },
            EventKind::OrderConfirmed | EventKind::RequestConfirmed => EventIntent::Activate {
                confirmation: true,
            },
            EventKind::SubscriptionCanceled => {
                EventIntent::Terminate(Termination::Cancel(CancelReason::Canceled))
            }
            EventKind::PurchaseRefunded => {
                EventIntent::Terminate(Termination::Cancel(CancelReason::Refund))
            }
            EventKind::PurchaseChargeback => {
                EventIntent::Terminate(Termination::Cancel(CancelReason::Chargeback))
            }
            EventKind::SubscriptionExpired | EventKind::ProductAccessEnded => {
                EventIntent::Terminate(Termination::Expire)
            }
            EventKind::PaymentPending => EventIntent::Acknowledge,
        }
    }

    pub fn is_confirmation(&self) -> bool {
        matches!(
            self.intent(),
            EventIntent::Activate { confirmation: true }
        )
    }

    pub fn is_termination(&self) -> bool {
        matches!(self.intent(), EventIntent::Terminate(_))
    }

    /// Transaction status implied by this event.
    pub fn transaction_status(&self) -> TransactionStatus {
        match self {
            EventKind::PurchaseRefunded => TransactionStatus::Refunded,
            EventKind::PurchaseChargeback => TransactionStatus::Chargeback,
            _ => TransactionStatus::Active,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════
// Envelope schema
// ════════════════════════════════════════════════════════════════════

/// Raw envelope as decoded from the request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "event-type", alias = "event_type", alias = "event", default)]
    pub event_type: Option<String>,

    #[serde(alias = "sandbox", alias = "is_test", default, deserialize_with = "lenient_bool")]
    pub test: bool,

    #[serde(default)]
    pub buyer: Option<BuyerPayload>,

    #[serde(default)]
    pub purchase: Option<PurchasePayload>,

    #[serde(default)]
    pub product: Option<ProductPayload>,

    #[serde(default)]
    pub subscription: Option<SubscriptionPayload>,

    #[serde(alias = "Metadata", default, deserialize_with = "lenient_map")]
    pub metadata: Map<String, Value>,

    /// Fields not covered by the schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyerPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(alias = "full_name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchasePayload {
    #[serde(
        alias = "PaymentId",
        alias = "payment_id",
        alias = "order_id",
        alias = "transaction",
        default,
        deserialize_with = "lenient_string"
    )]
    pub id: Option<String>,
    #[serde(alias = "value", alias = "price", default)]
    pub amount: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(alias = "payment_type", default, deserialize_with = "lenient_string")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub installments: Option<Value>,
    #[serde(alias = "approved_date", alias = "order_date", default)]
    pub paid_at: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(alias = "plan", default, deserialize_with = "lenient_string")]
    pub plan_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub interval: Option<String>,
    #[serde(default)]
    pub interval_count: Option<Value>,
    #[serde(alias = "charge_frequency_months", default)]
    pub recurrence_months: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| value_as_string(&v)))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

fn lenient_map<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════════
// Parsed payload
// ════════════════════════════════════════════════════════════════════

/// Decoded envelope plus the original JSON.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub envelope: WebhookEnvelope,
    pub raw: Value,
}

/// Classification of an inbound body.
#[derive(Debug, Clone)]
pub enum ParsedWebhook {
    /// Explicit test/sandbox delivery.
    Sandbox { event_type: Option<String> },
    /// An event kind the dispatcher handles.
    Known { kind: EventKind, payload: WebhookPayload },
    /// Missing or unrecognised event type.
    Unknown { event_type: Option<String> },
}

/// Parses and classifies a raw request body.
///
/// Only a body that is not a JSON object, or whose sub-objects have the wrong
/// shape, is an error. Everything else is classified.
pub fn parse_webhook(body: &[u8]) -> Result<ParsedWebhook, BillingError> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;
    if !raw.is_object() {
        return Err(BillingError::MalformedPayload(
            "payload must be a JSON object".to_string(),
        ));
    }

    let envelope: WebhookEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

    if envelope.test {
        return Ok(ParsedWebhook::Sandbox {
            event_type: envelope.event_type,
        });
    }

    match envelope.event_type.as_deref().and_then(EventKind::from_wire) {
        Some(kind) => Ok(ParsedWebhook::Known {
            kind,
            payload: WebhookPayload { envelope, raw },
        }),
        None => Ok(ParsedWebhook::Unknown {
            event_type: envelope.event_type,
        }),
    }
}

impl WebhookPayload {
    fn metadata_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.envelope.metadata.get(*k))
            .find_map(value_as_string)
    }

    fn extra_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.envelope.extra.get(*k))
            .find_map(value_as_string)
    }

    /// Provider-native order id; the idempotency key.
    pub fn order_id(&self) -> Option<String> {
        self.envelope
            .purchase
            .as_ref()
            .and_then(|p| p.id.clone())
            .or_else(|| self.extra_str(&["PaymentId", "payment_id", "order_id"]))
    }

    /// Identity fields carried by metadata and the buyer block.
    pub fn identity_hints(&self) -> IdentityHints {
        let user_email = self
            .envelope
            .buyer
            .as_ref()
            .and_then(|b| b.email.clone())
            .or_else(|| self.metadata_str(&["email", "userEmail", "user_email"]));

        IdentityHints {
            user_id: MemberId::parse_optional(
                self.metadata_str(&["userId", "user_id", "memberId", "member_id"])
                    .as_deref(),
            ),
            user_email,
            partner_id: PartnerId::parse_optional(
                self.metadata_str(&["partnerId", "partner_id"]).as_deref(),
            ),
            partner_link_id: PartnerLinkId::parse_optional(
                self.metadata_str(&["partnerLinkId", "partner_link_id", "linkId", "link_id"])
                    .as_deref(),
            ),
        }
    }

    pub fn user_name(&self) -> Option<String> {
        self.envelope.buyer.as_ref().and_then(|b| b.name.clone())
    }

    /// Amount in minor units. Card amounts are already minor units; checkout
    /// amounts are decimal.
    pub fn amount_minor(&self, provider: Provider) -> Result<i64, ValidationError> {
        let Some(amount) = self.envelope.purchase.as_ref().and_then(|p| p.amount.as_ref()) else {
            return Ok(0);
        };
        match provider {
            Provider::Checkout => decimal_value_to_minor(amount),
            Provider::Card => match amount {
                Value::Number(n) => n.as_i64().ok_or_else(|| {
                    ValidationError::invalid_format("amount", "card amounts are integer minor units")
                }),
                Value::String(s) => s.trim().parse::<i64>().or_else(|_| parse_minor_units(s)),
                Value::Null => Ok(0),
                _ => Err(ValidationError::invalid_format("amount", "expected number")),
            },
        }
    }

    pub fn currency(&self) -> String {
        self.envelope
            .purchase
            .as_ref()
            .and_then(|p| p.currency.clone())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    pub fn payment_method(&self) -> Option<String> {
        self.envelope
            .purchase
            .as_ref()
            .and_then(|p| p.payment_method.clone())
    }

    /// Number of installments, at least 1.
    pub fn installments(&self) -> u32 {
        self.envelope
            .purchase
            .as_ref()
            .and_then(|p| p.installments.as_ref())
            .and_then(value_as_i64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1)
            .max(1)
    }

    /// Payment instant, from unix seconds/millis or a date string.
    pub fn paid_at(&self) -> Option<Timestamp> {
        let value = self.envelope.purchase.as_ref()?.paid_at.as_ref()?;
        match value {
            Value::Number(n) => n.as_i64().and_then(Timestamp::from_epoch_number),
            Value::String(s) => Timestamp::parse_lenient(s),
            _ => None,
        }
    }

    pub fn plan_name(&self) -> Option<String> {
        self.envelope
            .subscription
            .as_ref()
            .and_then(|s| s.plan_name.clone())
            .or_else(|| self.envelope.product.as_ref().and_then(|p| p.name.clone()))
    }

    /// Product id, stored as the subscription's price id.
    pub fn price_id(&self) -> Option<String> {
        self.envelope.product.as_ref().and_then(|p| p.id.clone())
    }

    /// Plan cadence from an explicit interval, a months multiplier, or monthly.
    pub fn cadence(&self) -> Result<PlanCadence, ValidationError> {
        let Some(sub) = self.envelope.subscription.as_ref() else {
            return Ok(PlanCadence::monthly());
        };
        let count = sub.interval_count.as_ref().and_then(value_as_i64).unwrap_or(1);

        if let Some(interval) = sub.interval.as_deref().and_then(PlanInterval::parse) {
            return PlanCadence::new(interval, count);
        }
        if let Some(months) = sub.recurrence_months.as_ref().and_then(value_as_i64) {
            return PlanCadence::from_recurrence_months(months);
        }
        Ok(PlanCadence::monthly())
    }
}
