//! RegisterCheckoutIntentHandler - records who is about to pay and which
//! partner sent them, before the provider redirect.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PendingIdentityHint};
use crate::domain::foundation::{HintId, MemberId, PartnerId, PartnerLinkId, Timestamp};
use crate::ports::{IdentityHintRepository, MemberDirectory, ReferralLinkStore};

#[derive(Debug, Clone)]
pub struct RegisterCheckoutIntentCommand {
    pub member_id: MemberId,
    pub email: Option<String>,
    pub partner_id: Option<PartnerId>,
    pub partner_link_id: Option<PartnerLinkId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCheckoutIntentResult {
    pub hint_id: HintId,
    pub partner_id: Option<PartnerId>,
    pub expires_at: Timestamp,
}

pub struct RegisterCheckoutIntentHandler {
    hints: Arc<dyn IdentityHintRepository>,
    links: Arc<dyn ReferralLinkStore>,
    members: Arc<dyn MemberDirectory>,
    ttl_minutes: i64,
}

impl RegisterCheckoutIntentHandler {
    pub fn new(
        hints: Arc<dyn IdentityHintRepository>,
        links: Arc<dyn ReferralLinkStore>,
        members: Arc<dyn MemberDirectory>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            hints,
            links,
            members,
            ttl_minutes,
        }
    }

    pub async fn handle(
        &self,
        cmd: RegisterCheckoutIntentCommand,
    ) -> Result<RegisterCheckoutIntentResult, BillingError> {
        let partner_id = match (&cmd.partner_id, &cmd.partner_link_id) {
            (Some(partner), _) => Some(partner.clone()),
            (None, Some(link)) => self.links.partner_for_link(link).await.unwrap_or_else(|e| {
                tracing::warn!(link_id = %link, error = %e, "Link lookup failed; storing link only");
                None
            }),
            (None, None) => None,
        };

        let email = match cmd.email.clone() {
            Some(email) => Some(email),
            None => match self.members.find_by_id(&cmd.member_id).await {
                Ok(profile) => profile.and_then(|p| p.email),
                Err(e) => {
                    tracing::warn!(member_id = %cmd.member_id, error = %e, "Member lookup failed");
                    None
                }
            },
        };

        let hint = PendingIdentityHint::new(
            Some(cmd.member_id.clone()),
            email.as_deref(),
            partner_id,
            cmd.partner_link_id.clone(),
            self.ttl_minutes,
            Timestamp::now(),
        )?;
        self.hints.save(&hint).await?;

        tracing::info!(
            member_id = %cmd.member_id,
            hint_id = %hint.id,
            partner_id = ?hint.partner_id,
            "Checkout intent registered"
        );

        Ok(RegisterCheckoutIntentResult {
            hint_id: hint.id,
            partner_id: hint.partner_id,
            expires_at: hint.expires_at,
        })
    }
}
