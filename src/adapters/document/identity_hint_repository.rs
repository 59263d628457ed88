//! IdentityHintRepository over a DocumentStore.

use async_trait::async_trait;
use std::sync::Arc;

use super::codec::{from_document, to_body};
use super::collections::IDENTITY_HINTS;
use crate::domain::billing::PendingIdentityHint;
use crate::domain::foundation::{DomainError, ErrorCode, HintId, MemberId};
use crate::ports::{DocumentStore, Filter, IdentityHintRepository, OrderBy, SaveResult};

pub struct DocumentIdentityHintRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentIdentityHintRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn newest_first(&self, filter: Filter) -> Result<Vec<PendingIdentityHint>, DomainError> {
        self.store
            .find_many(IDENTITY_HINTS, &filter, Some(&OrderBy::desc("created_at")), None)
            .await?
            .into_iter()
            .map(|doc| from_document(IDENTITY_HINTS, doc))
            .collect()
    }
}

#[async_trait]
impl IdentityHintRepository for DocumentIdentityHintRepository {
    async fn save(&self, hint: &PendingIdentityHint) -> Result<(), DomainError> {
        let id = hint.id.to_string();
        match self
            .store
            .insert_with_id(IDENTITY_HINTS, &id, to_body(hint)?)
            .await?
        {
            SaveResult::Inserted => Ok(()),
            SaveResult::AlreadyExists => Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Identity hint {} already exists", id),
            )),
        }
    }

    async fn find_for_user(&self, user_id: &MemberId) -> Result<Vec<PendingIdentityHint>, DomainError> {
        self.newest_first(Filter::new().eq("user_id", user_id.as_str()))
            .await
    }

    async fn find_for_email(&self, email: &str) -> Result<Vec<PendingIdentityHint>, DomainError> {
        self.newest_first(Filter::new().eq("user_email", email)).await
    }

    async fn delete(&self, id: &HintId) -> Result<bool, DomainError> {
        self.store.delete(IDENTITY_HINTS, &id.to_string()).await
    }
}
