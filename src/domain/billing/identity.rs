//! Identity attribution value objects.
//!
//! Webhook events frequently arrive without a reliable member id, partner id
//! or referral link. These types carry whatever the event supplied, the
//! strategies used to fill the gaps, and the short-lived hints recorded at
//! checkout time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    HintId, MemberId, PartnerId, PartnerLinkId, Timestamp, ValidationError,
};

/// Lower-cases and trims an email. Returns `None` for blank or non-email input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    Some(email)
}

/// Identity fields as supplied by an event, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHints {
    pub user_id: Option<MemberId>,
    pub user_email: Option<String>,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
}

impl IdentityHints {
    /// Normalized email, if any.
    pub fn email(&self) -> Option<String> {
        self.user_email.as_deref().and_then(normalize_email)
    }
}

/// Why the identity is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionIntent {
    /// Purchase or access grant.
    Activate,
    /// Cancellation, expiration, refund or chargeback.
    Terminate,
}

impl ResolutionIntent {
    /// Terminations never attribute a brand-new default partner.
    pub fn allows_default_partner(&self) -> bool {
        matches!(self, ResolutionIntent::Activate)
    }
}

/// One lookup in the partner attribution chain.
///
/// The configured order is walked front to back; the first strategy that
/// yields a partner wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStrategy {
    /// Partner or link id carried by the event itself.
    Supplied,
    /// Hint recorded when the member started checkout.
    PendingHint,
    /// Most recent attributed transaction of the same member.
    PriorTransaction,
    /// Most recent referral-link access by the same email.
    LinkAccess,
    /// Configured default partner, or the first active partner.
    DefaultPartner,
}

impl PartnerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStrategy::Supplied => "supplied",
            PartnerStrategy::PendingHint => "pending_hint",
            PartnerStrategy::PriorTransaction => "prior_transaction",
            PartnerStrategy::LinkAccess => "link_access",
            PartnerStrategy::DefaultPartner => "default_partner",
        }
    }

    pub fn default_order() -> Vec<PartnerStrategy> {
        vec![
            PartnerStrategy::Supplied,
            PartnerStrategy::PendingHint,
            PartnerStrategy::PriorTransaction,
            PartnerStrategy::LinkAccess,
            PartnerStrategy::DefaultPartner,
        ]
    }

    /// Parses a comma-separated strategy list, rejecting duplicates.
    pub fn parse_list(raw: &str) -> Result<Vec<PartnerStrategy>, ValidationError> {
        let mut strategies = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let strategy: PartnerStrategy = part.parse()?;
            if strategies.contains(&strategy) {
                return Err(ValidationError::invalid_format(
                    "partner_strategies",
                    format!("'{}' listed twice", part),
                ));
            }
            strategies.push(strategy);
        }
        if strategies.is_empty() {
            return Err(ValidationError::empty_field("partner_strategies"));
        }
        Ok(strategies)
    }
}

impl fmt::Display for PartnerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnerStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supplied" => Ok(PartnerStrategy::Supplied),
            "pending_hint" => Ok(PartnerStrategy::PendingHint),
            "prior_transaction" => Ok(PartnerStrategy::PriorTransaction),
            "link_access" => Ok(PartnerStrategy::LinkAccess),
            "default_partner" => Ok(PartnerStrategy::DefaultPartner),
            other => Err(ValidationError::invalid_format(
                "partner_strategies",
                format!("unknown strategy '{}'", other),
            )),
        }
    }
}

/// Best-effort identity after running the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: Option<MemberId>,
    pub user_email: Option<String>,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
    /// Strategy that produced the partner, when one was found.
    pub partner_source: Option<PartnerStrategy>,
}

/// Short-lived bridge between checkout initiation and the later webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIdentityHint {
    pub id: HintId,
    pub user_id: Option<MemberId>,
    pub user_email: Option<String>,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl PendingIdentityHint {
    /// Creates a hint valid for `ttl_minutes` from `now`.
    ///
    /// Needs a user id or a usable email, and a partner id or link id.
    pub fn new(
        user_id: Option<MemberId>,
        user_email: Option<&str>,
        partner_id: Option<PartnerId>,
        partner_link_id: Option<PartnerLinkId>,
        ttl_minutes: i64,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        let user_email = user_email.and_then(normalize_email);
        if user_id.is_none() && user_email.is_none() {
            return Err(ValidationError::empty_field("user_id"));
        }
        if partner_id.is_none() && partner_link_id.is_none() {
            return Err(ValidationError::empty_field("partner_id"));
        }
        if ttl_minutes < 1 {
            return Err(ValidationError::out_of_range(
                "hint_ttl_minutes",
                1,
                i64::MAX,
                ttl_minutes,
            ));
        }
        let expires_at = now.add_minutes(ttl_minutes).ok_or_else(|| {
            ValidationError::invalid_format("expires_at", "hint expiry out of range")
        })?;

        Ok(Self {
            id: HintId::new(),
            user_id,
            user_email,
            partner_id,
            partner_link_id,
            created_at: now,
            expires_at,
        })
    }

    /// A hint is never matched at or after its expiry.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> MemberId {
        MemberId::new(id).unwrap()
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Ana@Example.COM "), Some("ana@example.com".into()));
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email(""), None);
    }

    #[test]
    fn only_activation_may_use_default_partner() {
        assert!(ResolutionIntent::Activate.allows_default_partner());
        assert!(!ResolutionIntent::Terminate.allows_default_partner());
    }

    #[test]
    fn strategy_list_parses_in_order() {
        let list = PartnerStrategy::parse_list("pending_hint, supplied,default_partner").unwrap();
        assert_eq!(
            list,
            vec![
                PartnerStrategy::PendingHint,
                PartnerStrategy::Supplied,
                PartnerStrategy::DefaultPartner
            ]
        );
    }

    #[test]
    fn strategy_list_rejects_unknown_and_duplicates() {
        assert!(PartnerStrategy::parse_list("supplied,astrology").is_err());
        assert!(PartnerStrategy::parse_list("supplied,supplied").is_err());
        assert!(PartnerStrategy::parse_list(" , ").is_err());
    }

    #[test]
    fn hint_requires_user_and_partner() {
        let now = Timestamp::now();
        let partner = PartnerId::new("p-1").ok();
        assert!(PendingIdentityHint::new(None, None, partner.clone(), None, 60, now).is_err());
        assert!(PendingIdentityHint::new(Some(member("u-1")), None, None, None, 60, now).is_err());
        assert!(PendingIdentityHint::new(None, Some("a@b.co"), partner, None, 60, now).is_ok());
    }

    #[test]
    fn hint_expires_exactly_at_ttl() {
        let now = Timestamp::parse_rfc3339("2024-05-01T10:00:00Z").unwrap();
        let hint = PendingIdentityHint::new(
            Some(member("u-1")),
            None,
            PartnerId::new("p-1").ok(),
            None,
            60,
            now,
        )
        .unwrap();

        assert!(!hint.is_expired_at(&now.add_minutes(59).unwrap()));
        assert!(hint.is_expired_at(&now.add_minutes(60).unwrap()));
    }
}
