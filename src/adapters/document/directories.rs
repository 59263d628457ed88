//! Member, partner and referral-link lookups over a DocumentStore.
//!
//! These collections belong to other parts of the platform. Bodies are read
//! leniently: only the fields billing needs are decoded.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::codec::from_document;
use super::collections::{LINK_ACCESSES, MEMBERS, PARTNERS, PARTNER_LINKS};
use crate::domain::foundation::{DomainError, MemberId, PartnerId, PartnerLinkId};
use crate::ports::{
    DocumentStore, Filter, LinkAccess, MemberDirectory, MemberProfile, OrderBy,
    PartnerDirectory, ReferralLinkStore, StoredDocument,
};

#[derive(Debug, Deserialize)]
struct MemberBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    card_customer_id: Option<String>,
}

fn member_profile(doc: StoredDocument) -> Result<Option<MemberProfile>, DomainError> {
    let Ok(id) = MemberId::new(doc.id.as_str()) else {
        return Ok(None);
    };
    let body: MemberBody = from_document(MEMBERS, doc)?;
    Ok(Some(MemberProfile {
        id,
        email: body.email,
        name: body.name,
        card_customer_id: body.card_customer_id,
    }))
}

/// Members keyed by member id, with an `email` field.
pub struct DocumentMemberDirectory {
    store: Arc<dyn DocumentStore>,
}

impl DocumentMemberDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MemberDirectory for DocumentMemberDirectory {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<MemberProfile>, DomainError> {
        match self.store.get(MEMBERS, id.as_str()).await? {
            Some(doc) => member_profile(doc),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<MemberProfile>, DomainError> {
        match self
            .store
            .find_one(MEMBERS, &Filter::new().eq("email", email))
            .await?
        {
            Some(doc) => member_profile(doc),
            None => Ok(None),
        }
    }
}

/// Partners keyed by partner id with a boolean `active` flag.
pub struct DocumentPartnerDirectory {
    store: Arc<dyn DocumentStore>,
}

impl DocumentPartnerDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PartnerDirectory for DocumentPartnerDirectory {
    async fn first_active_partner(&self) -> Result<Option<PartnerId>, DomainError> {
        let docs = self
            .store
            .find_many(
                PARTNERS,
                &Filter::new().eq("active", true),
                Some(&OrderBy::asc("created_at")),
                Some(1),
            )
            .await?;
        Ok(docs
            .into_iter()
            .next()
            .and_then(|doc| PartnerId::new(doc.id).ok()))
    }
}

#[derive(Debug, Deserialize)]
struct LinkBody {
    #[serde(default)]
    partner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessBody {
    #[serde(default)]
    link_id: Option<String>,
    #[serde(default)]
    partner_id: Option<String>,
}

/// Referral links (`partner_links`) and their recorded visits
/// (`link_accesses`, each with `email`, `link_id`, `accessed_at`).
pub struct DocumentReferralLinkStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentReferralLinkStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReferralLinkStore for DocumentReferralLinkStore {
    async fn partner_for_link(
        &self,
        link_id: &PartnerLinkId,
    ) -> Result<Option<PartnerId>, DomainError> {
        let Some(doc) = self.store.get(PARTNER_LINKS, link_id.as_str()).await? else {
            return Ok(None);
        };
        let body: LinkBody = from_document(PARTNER_LINKS, doc)?;
        Ok(PartnerId::parse_optional(body.partner_id.as_deref()))
    }

    async fn latest_access_for_email(&self, email: &str) -> Result<Option<LinkAccess>, DomainError> {
        let docs = self
            .store
            .find_many(
                LINK_ACCESSES,
                &Filter::new().eq("email", email).not_null("link_id"),
                Some(&OrderBy::desc("accessed_at")),
                Some(1),
            )
            .await?;
        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };

        let body: AccessBody = from_document(LINK_ACCESSES, doc)?;
        let Some(link_id) = PartnerLinkId::parse_optional(body.link_id.as_deref()) else {
            return Ok(None);
        };
        let partner_id = match PartnerId::parse_optional(body.partner_id.as_deref()) {
            Some(partner) => Some(partner),
            None => self.partner_for_link(&link_id).await?,
        };

        Ok(partner_id.map(|partner_id| LinkAccess {
            link_id,
            partner_id,
        }))
    }

    async fn increment_conversions(&self, link_id: &PartnerLinkId) -> Result<i64, DomainError> {
        self.store
            .increment(PARTNER_LINKS, link_id.as_str(), "conversions", 1)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDocumentStore;
    use serde_json::json;

    async fn seeded() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert_with_id(MEMBERS, "u-1", json!({"email": "ana@example.com", "name": "Ana"}))
            .await
            .unwrap();
        store
            .insert_with_id(PARTNERS, "p-off", json!({"active": false, "created_at": "2023-01-01T00:00:00.000000Z"}))
            .await
            .unwrap();
        store
            .insert_with_id(PARTNERS, "p-on", json!({"active": true, "created_at": "2023-02-01T00:00:00.000000Z"}))
            .await
            .unwrap();
        store
            .insert_with_id(PARTNER_LINKS, "link-1", json!({"partner_id": "p-on", "conversions": 4}))
            .await
            .unwrap();
        store
            .insert(
                LINK_ACCESSES,
                json!({"email": "ana@example.com", "link_id": "link-1", "accessed_at": "2024-01-01T00:00:00.000000Z"}),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn member_lookup_by_id_and_email() {
        let store = seeded().await;
        let directory = DocumentMemberDirectory::new(store);

        let by_id = directory
            .find_by_id(&MemberId::new("u-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.email.as_deref(), Some("ana@example.com"));

        let by_email = directory.find_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id.as_str(), "u-1");
        assert!(directory.find_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_active_partner_ignores_inactive() {
        let directory = DocumentPartnerDirectory::new(seeded().await);
        let partner = directory.first_active_partner().await.unwrap().unwrap();
        assert_eq!(partner.as_str(), "p-on");
    }

    #[tokio::test]
    async fn link_access_falls_back_to_link_partner() {
        let links = DocumentReferralLinkStore::new(seeded().await);
        let access = links
            .latest_access_for_email("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(access.link_id.as_str(), "link-1");
        assert_eq!(access.partner_id.as_str(), "p-on");
    }

    #[tokio::test]
    async fn increment_conversions_is_cumulative() {
        let links = DocumentReferralLinkStore::new(seeded().await);
        let link = PartnerLinkId::new("link-1").unwrap();
        assert_eq!(links.increment_conversions(&link).await.unwrap(), 5);
        assert_eq!(links.increment_conversions(&link).await.unwrap(), 6);
    }
}
