//! Strongly-typed identifier value objects.
//!
//! Identifiers minted by this service are UUID-backed. Identifiers that come
//! from outside (members, partners, referral links) are opaque non-empty
//! strings because the store and the payment providers own their format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, rejecting blank input.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Lenient constructor for optional payload fields: blank becomes `None`.
            pub fn parse_optional(raw: Option<&str>) -> Option<Self> {
                raw.and_then(|s| Self::new(s).ok())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a subscription record.
    SubscriptionId
);

uuid_id!(
    /// Unique identifier for a pending identity hint.
    HintId
);

external_id!(
    /// Member (end-user) identifier as issued by the account system.
    MemberId,
    "member_id"
);

external_id!(
    /// Partner (merchant) identifier revenue and referrals are attributed to.
    PartnerId,
    "partner_id"
);

external_id!(
    /// Referral link identifier.
    PartnerLinkId,
    "partner_link_id"
);

/// Identifier of a recorded Transaction.
///
/// Keyed transactions use the deterministic form `"{provider}:{order_id}"`,
/// which makes the store's primary key the idempotency boundary. Events
/// without an order id get a random identifier and can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn for_order(provider: &str, order_id: &str) -> Self {
        Self(format!("{}:{}", provider, order_id))
    }

    pub fn unkeyed() -> Self {
        Self(format!("unkeyed:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unkeyed(&self) -> bool {
        self.0.starts_with("unkeyed:")
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
