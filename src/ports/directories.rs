//! Read ports onto collaborator-owned records: members, partners and
//! referral links.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, MemberId, PartnerId, PartnerLinkId};

/// The parts of a member account billing needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Customer id at the card-billing provider, if the member has one.
    pub card_customer_id: Option<String>,
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<MemberProfile>, DomainError>;

    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<MemberProfile>, DomainError>;
}

#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Any active partner, used as the last attribution fallback.
    async fn first_active_partner(&self) -> Result<Option<PartnerId>, DomainError>;
}

/// A visit to a referral link by a known email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAccess {
    pub link_id: PartnerLinkId,
    pub partner_id: PartnerId,
}

#[async_trait]
pub trait ReferralLinkStore: Send + Sync {
    async fn partner_for_link(&self, link_id: &PartnerLinkId)
        -> Result<Option<PartnerId>, DomainError>;

    /// Most recent access by `email` (normalized).
    async fn latest_access_for_email(&self, email: &str) -> Result<Option<LinkAccess>, DomainError>;

    /// Atomically bumps the link's conversion counter, returning the new count.
    async fn increment_conversions(&self, link_id: &PartnerLinkId) -> Result<i64, DomainError>;
}
