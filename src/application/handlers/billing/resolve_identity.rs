//! IdentityResolver - best-effort (user, partner, link) attribution.
//!
//! The member is taken from the event or looked up by normalized email. The
//! partner pair comes from the first configured strategy that produces one.
//! Lookup failures are logged and treated as a miss: attribution uncertainty
//! never blocks a payment acknowledgement.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::billing::{
    IdentityHints, PartnerStrategy, PendingIdentityHint, ResolutionIntent, ResolvedIdentity,
};
use crate::domain::foundation::{MemberId, PartnerId, PartnerLinkId, Timestamp};
use crate::ports::{
    IdentityHintRepository, MemberDirectory, PartnerDirectory, ReferralLinkStore,
    TransactionRepository,
};

/// Partner attribution produced by one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PartnerMatch {
    partner_id: Option<PartnerId>,
    partner_link_id: Option<PartnerLinkId>,
    /// A consumed hint may also name the member.
    user_id: Option<MemberId>,
}

pub struct IdentityResolver {
    members: Arc<dyn MemberDirectory>,
    hints: Arc<dyn IdentityHintRepository>,
    transactions: Arc<dyn TransactionRepository>,
    links: Arc<dyn ReferralLinkStore>,
    partners: Arc<dyn PartnerDirectory>,
    strategies: Vec<PartnerStrategy>,
    default_partner: Option<PartnerId>,
}

impl IdentityResolver {
    pub fn new(
        members: Arc<dyn MemberDirectory>,
        hints: Arc<dyn IdentityHintRepository>,
        transactions: Arc<dyn TransactionRepository>,
        links: Arc<dyn ReferralLinkStore>,
        partners: Arc<dyn PartnerDirectory>,
    ) -> Self {
        Self {
            members,
            hints,
            transactions,
            links,
            partners,
            strategies: PartnerStrategy::default_order(),
            default_partner: None,
        }
    }

    /// Replaces the strategy order.
    pub fn with_strategies(mut self, strategies: Vec<PartnerStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Partner used by [`PartnerStrategy::DefaultPartner`] before falling
    /// back to the first active partner on record.
    pub fn with_default_partner(mut self, partner: Option<PartnerId>) -> Self {
        self.default_partner = partner;
        self
    }

    pub async fn resolve(&self, hints: &IdentityHints, intent: ResolutionIntent) -> ResolvedIdentity {
        let now = Timestamp::now();
        let user_email = hints.email();
        let user_id = match &hints.user_id {
            Some(id) => Some(id.clone()),
            None => self.user_by_email(user_email.as_deref()).await,
        };

        let mut resolved = ResolvedIdentity {
            user_id,
            user_email,
            ..Default::default()
        };

        for strategy in &self.strategies {
            if *strategy == PartnerStrategy::DefaultPartner && !intent.allows_default_partner() {
                continue;
            }
            let Some(found) = self.try_strategy(*strategy, hints, &resolved, &now).await else {
                continue;
            };

            tracing::debug!(
                partner_source = strategy.as_str(),
                partner_id = ?found.partner_id,
                partner_link_id = ?found.partner_link_id,
                "Partner attribution resolved"
            );
            resolved.partner_id = found.partner_id;
            resolved.partner_link_id = found.partner_link_id;
            resolved.partner_source = Some(*strategy);
            if resolved.user_id.is_none() {
                resolved.user_id = found.user_id;
            }
            break;
        }

        resolved
    }

    async fn user_by_email(&self, email: Option<&str>) -> Option<MemberId> {
        let email = email?;
        match self.members.find_by_email(email).await {
            Ok(profile) => profile.map(|p| p.id),
            Err(e) => {
                tracing::warn!(error = %e, "Member lookup by email failed");
                None
            }
        }
    }

    async fn try_strategy(
        &self,
        strategy: PartnerStrategy,
        hints: &IdentityHints,
        resolved: &ResolvedIdentity,
        now: &Timestamp,
    ) -> Option<PartnerMatch> {
        match strategy {
            PartnerStrategy::Supplied => self.supplied(hints).await,
            PartnerStrategy::PendingHint => self.pending_hint(resolved, now).await,
            PartnerStrategy::PriorTransaction => self.prior_transaction(resolved).await,
            PartnerStrategy::LinkAccess => self.link_access(resolved).await,
            PartnerStrategy::DefaultPartner => self.default_partner().await,
        }
    }

    async fn supplied(&self, hints: &IdentityHints) -> Option<PartnerMatch> {
        if hints.partner_id.is_none() && hints.partner_link_id.is_none() {
            return None;
        }
        let partner_id = match (&hints.partner_id, &hints.partner_link_id) {
            (Some(partner), _) => Some(partner.clone()),
            (None, Some(link)) => match self.links.partner_for_link(link).await {
                Ok(partner) => partner,
                Err(e) => {
                    tracing::warn!(partner_link_id = %link, error = %e, "Referral link lookup failed");
                    None
                }
            },
            (None, None) => None,
        };
        Some(PartnerMatch {
            partner_id,
            partner_link_id: hints.partner_link_id.clone(),
            user_id: None,
        })
    }

    /// Newest unexpired hint for the member or email, consumed on match.
    async fn pending_hint(&self, resolved: &ResolvedIdentity, now: &Timestamp) -> Option<PartnerMatch> {
        let mut candidates: Vec<PendingIdentityHint> = Vec::new();
        if let Some(user_id) = &resolved.user_id {
            match self.hints.find_for_user(user_id).await {
                Ok(found) => candidates.extend(found),
                Err(e) => tracing::warn!(member_id = %user_id, error = %e, "Hint lookup failed"),
            }
        }
        if let Some(email) = &resolved.user_email {
            match self.hints.find_for_email(email).await {
                Ok(found) => candidates.extend(found),
                Err(e) => tracing::warn!(error = %e, "Hint lookup by email failed"),
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|h| seen.insert(h.id));
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        for hint in candidates.into_iter().filter(|h| !h.is_expired_at(now)) {
            match self.hints.delete(&hint.id).await {
                // Consumed concurrently by another delivery.
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(hint_id = %hint.id, error = %e, "Failed to consume identity hint");
                }
            }
            return Some(PartnerMatch {
                partner_id: hint.partner_id,
                partner_link_id: hint.partner_link_id,
                user_id: hint.user_id,
            });
        }
        None
    }

    async fn prior_transaction(&self, resolved: &ResolvedIdentity) -> Option<PartnerMatch> {
        let user_id = resolved.user_id.as_ref()?;
        match self.transactions.find_latest_attributed_for_user(user_id).await {
            Ok(found) => found.map(|tx| PartnerMatch {
                partner_id: tx.partner_id,
                partner_link_id: tx.partner_link_id,
                user_id: None,
            }),
            Err(e) => {
                tracing::warn!(member_id = %user_id, error = %e, "Prior transaction lookup failed");
                None
            }
        }
    }

    async fn link_access(&self, resolved: &ResolvedIdentity) -> Option<PartnerMatch> {
        let email = resolved.user_email.as_deref()?;
        match self.links.latest_access_for_email(email).await {
            Ok(found) => found.map(|access| PartnerMatch {
                partner_id: Some(access.partner_id),
                partner_link_id: Some(access.link_id),
                user_id: None,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Referral link access lookup failed");
                None
            }
        }
    }

    async fn default_partner(&self) -> Option<PartnerMatch> {
        let partner_id = match &self.default_partner {
            Some(partner) => Some(partner.clone()),
            None => match self.partners.first_active_partner().await {
                Ok(partner) => partner,
                Err(e) => {
                    tracing::warn!(error = %e, "Active partner lookup failed");
                    None
                }
            },
        }?;
        Some(PartnerMatch {
            partner_id: Some(partner_id),
            partner_link_id: None,
            user_id: None,
        })
    }
}
