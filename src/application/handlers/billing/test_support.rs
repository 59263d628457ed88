//! Shared fixtures for billing handler tests: every repository wired over
//! one in-memory document store.

use serde_json::json;
use std::sync::Arc;

use super::{IdempotencyGuard, IdentityResolver, SubscriptionLifecycle};
use crate::adapters::document::collections::{
    IDENTITY_HINTS, LINK_ACCESSES, MEMBERS, PARTNERS, PARTNER_LINKS,
};
use crate::adapters::document::{
    DocumentIdentityHintRepository, DocumentMemberDirectory, DocumentPartnerDirectory,
    DocumentReferralLinkStore, DocumentSubscriptionRepository, DocumentTransactionRepository,
};
use crate::adapters::memory::InMemoryDocumentStore;
use crate::domain::billing::{CancelScope, PendingIdentityHint};
use crate::domain::foundation::{MemberId, PartnerId, PartnerLinkId, Timestamp};
use crate::ports::{DocumentStore, IdentityHintRepository};

pub(crate) struct Stores {
    pub store: Arc<InMemoryDocumentStore>,
    pub transactions: Arc<DocumentTransactionRepository>,
    pub subscriptions: Arc<DocumentSubscriptionRepository>,
    pub hints: Arc<DocumentIdentityHintRepository>,
    pub members: Arc<DocumentMemberDirectory>,
    pub partners: Arc<DocumentPartnerDirectory>,
    pub links: Arc<DocumentReferralLinkStore>,
}

impl Stores {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let shared: Arc<dyn DocumentStore> = store.clone();
        Self {
            transactions: Arc::new(DocumentTransactionRepository::new(shared.clone())),
            subscriptions: Arc::new(DocumentSubscriptionRepository::new(shared.clone())),
            hints: Arc::new(DocumentIdentityHintRepository::new(shared.clone())),
            members: Arc::new(DocumentMemberDirectory::new(shared.clone())),
            partners: Arc::new(DocumentPartnerDirectory::new(shared.clone())),
            links: Arc::new(DocumentReferralLinkStore::new(shared)),
            store,
        }
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(
            self.members.clone(),
            self.hints.clone(),
            self.transactions.clone(),
            self.links.clone(),
            self.partners.clone(),
        )
    }

    pub fn guard(&self) -> IdempotencyGuard {
        IdempotencyGuard::new(self.transactions.clone())
    }

    pub fn lifecycle(&self, scope: CancelScope) -> SubscriptionLifecycle {
        SubscriptionLifecycle::new(self.subscriptions.clone(), self.links.clone(), scope)
    }

    pub async fn seed_member(&self, id: &str, email: &str) {
        self.store
            .insert_with_id(MEMBERS, id, json!({"email": email, "name": "Test Member"}))
            .await
            .unwrap();
    }

    pub async fn seed_partner(&self, id: &str, active: bool) {
        self.store
            .insert_with_id(
                PARTNERS,
                id,
                json!({"active": active, "created_at": Timestamp::now()}),
            )
            .await
            .unwrap();
    }

    pub async fn seed_link(&self, link_id: &str, partner_id: &str) {
        self.store
            .insert_with_id(
                PARTNER_LINKS,
                link_id,
                json!({"partner_id": partner_id, "conversions": 0}),
            )
            .await
            .unwrap();
    }

    pub async fn seed_link_access(&self, email: &str, link_id: &str) {
        self.store
            .insert(
                LINK_ACCESSES,
                json!({"email": email, "link_id": link_id, "accessed_at": Timestamp::now()}),
            )
            .await
            .unwrap();
    }

    /// Hint with a 60 minute TTL starting at `created_at`.
    pub async fn seed_hint(
        &self,
        user_id: &str,
        partner_id: &str,
        link_id: Option<&str>,
        created_at: Timestamp,
    ) -> PendingIdentityHint {
        let hint = PendingIdentityHint::new(
            MemberId::new(user_id).ok(),
            None,
            PartnerId::new(partner_id).ok(),
            PartnerLinkId::parse_optional(link_id),
            60,
            created_at,
        )
        .unwrap();
        self.hints.save(&hint).await.unwrap();
        hint
    }

    pub async fn hint_count(&self) -> usize {
        self.store.count(IDENTITY_HINTS).await
    }

    pub async fn conversions(&self, link_id: &str) -> i64 {
        self.store
            .get(PARTNER_LINKS, link_id)
            .await
            .unwrap()
            .and_then(|doc| doc.body.get("conversions").and_then(|v| v.as_i64()))
            .unwrap_or(0)
    }
}
