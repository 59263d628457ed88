//! SubscriptionRepository over a DocumentStore.

use async_trait::async_trait;
use std::sync::Arc;

use super::codec::{from_document, relabel_not_found, to_body};
use super::collections::SUBSCRIPTIONS;
use crate::domain::billing::{Provider, Subscription};
use crate::domain::foundation::{DomainError, ErrorCode, MemberId, PartnerId};
use crate::ports::{DocumentStore, Filter, OrderBy, SaveResult, SubscriptionRepository};

pub struct DocumentSubscriptionRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSubscriptionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn find(&self, filter: Filter) -> Result<Vec<Subscription>, DomainError> {
        self.store
            .find_many(SUBSCRIPTIONS, &filter, Some(&OrderBy::desc("created_at")), None)
            .await?
            .into_iter()
            .map(|doc| from_document(SUBSCRIPTIONS, doc))
            .collect()
    }
}

#[async_trait]
impl SubscriptionRepository for DocumentSubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let id = subscription.id.to_string();
        match self
            .store
            .insert_with_id(SUBSCRIPTIONS, &id, to_body(subscription)?)
            .await?
        {
            SaveResult::Inserted => Ok(()),
            SaveResult::AlreadyExists => Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Subscription {} already exists", id),
            )),
        }
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.store
            .update(
                SUBSCRIPTIONS,
                &subscription.id.to_string(),
                to_body(subscription)?,
            )
            .await
            .map_err(|e| relabel_not_found(e, ErrorCode::SubscriptionNotFound))
    }

    async fn find_for_member(
        &self,
        member_id: &MemberId,
        provider: Provider,
        partner: Option<&PartnerId>,
    ) -> Result<Vec<Subscription>, DomainError> {
        let mut filter = Filter::new()
            .eq("member_id", member_id.as_str())
            .eq("provider", provider.as_str());
        if let Some(partner) = partner {
            filter = filter.eq("partner_id", partner.as_str());
        }
        self.find(filter).await
    }

    async fn find_by_member(&self, member_id: &MemberId) -> Result<Vec<Subscription>, DomainError> {
        self.find(Filter::new().eq("member_id", member_id.as_str()))
            .await
    }
}
