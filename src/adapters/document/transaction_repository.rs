//! TransactionRepository over a DocumentStore.

use async_trait::async_trait;
use std::sync::Arc;

use super::codec::{from_document, to_body};
use super::collections::TRANSACTIONS;
use crate::domain::billing::{IdentityPatch, Transaction};
use crate::domain::foundation::{DomainError, MemberId, TransactionId};
use crate::ports::{DocumentStore, Filter, OrderBy, SaveResult, TransactionRepository};

/// Transactions keyed by their [`TransactionId`], so the store's primary key
/// enforces one record per `(provider, order_id)`.
pub struct DocumentTransactionRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentTransactionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TransactionRepository for DocumentTransactionRepository {
    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError> {
        self.store
            .get(TRANSACTIONS, id.as_str())
            .await?
            .map(|doc| from_document(TRANSACTIONS, doc))
            .transpose()
    }

    async fn insert_if_absent(&self, transaction: &Transaction) -> Result<SaveResult, DomainError> {
        self.store
            .insert_with_id(TRANSACTIONS, transaction.id.as_str(), to_body(transaction)?)
            .await
    }

    async fn update(&self, transaction: &Transaction) -> Result<(), DomainError> {
        self.store
            .update(TRANSACTIONS, transaction.id.as_str(), to_body(transaction)?)
            .await
    }

    async fn patch_identity(
        &self,
        id: &TransactionId,
        patch: &IdentityPatch,
    ) -> Result<(), DomainError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.store
            .update(TRANSACTIONS, id.as_str(), to_body(patch)?)
            .await
    }

    async fn find_latest_attributed_for_user(
        &self,
        user_id: &MemberId,
    ) -> Result<Option<Transaction>, DomainError> {
        let filter = Filter::new()
            .eq("user_id", user_id.as_str())
            .not_null("partner_id");
        let docs = self
            .store
            .find_many(TRANSACTIONS, &filter, Some(&OrderBy::desc("created_at")), Some(1))
            .await?;

        docs.into_iter()
            .next()
            .map(|doc| from_document(TRANSACTIONS, doc))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDocumentStore;
    use crate::domain::billing::fixtures::transaction;
    use crate::domain::billing::{EventKind, TransactionStatus};
    use crate::domain::foundation::{PartnerId, Timestamp};

    fn repo() -> DocumentTransactionRepository {
        DocumentTransactionRepository::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn insert_if_absent_rejects_second_insert() {
        let repo = repo();
        let tx = transaction("ORD-1", EventKind::PurchaseApproved);

        assert_eq!(repo.insert_if_absent(&tx).await.unwrap(), SaveResult::Inserted);
        assert_eq!(
            repo.insert_if_absent(&tx).await.unwrap(),
            SaveResult::AlreadyExists
        );

        let stored = repo.find_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored, tx);
    }

    #[tokio::test]
    async fn patch_identity_keeps_other_fields() {
        let repo = repo();
        let tx = transaction("ORD-1", EventKind::PurchaseApproved);
        repo.insert_if_absent(&tx).await.unwrap();

        let patch = IdentityPatch {
            partner_id: PartnerId::new("p-1").ok(),
            ..Default::default()
        };
        repo.patch_identity(&tx.id, &patch).await.unwrap();

        let stored = repo.find_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.partner_id.unwrap().as_str(), "p-1");
        assert_eq!(stored.amount_minor, tx.amount_minor);
        assert_eq!(stored.raw_data, tx.raw_data);
    }

    #[tokio::test]
    async fn update_persists_status_change() {
        let repo = repo();
        let mut tx = transaction("ORD-1", EventKind::PurchaseApproved);
        repo.insert_if_absent(&tx).await.unwrap();

        tx.record_event(EventKind::PurchaseRefunded, Timestamp::now());
        repo.update(&tx).await.unwrap();

        let stored = repo.find_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Refunded);
        assert_eq!(stored.last_event_kind, EventKind::PurchaseRefunded);
    }

    #[tokio::test]
    async fn latest_attributed_skips_unattributed_and_picks_newest() {
        let repo = repo();
        let user = MemberId::new("u-1").unwrap();
        let base = Timestamp::parse_rfc3339("2024-01-01T00:00:00Z").unwrap();

        let mut old = transaction("ORD-1", EventKind::PurchaseApproved);
        old.user_id = Some(user.clone());
        old.partner_id = PartnerId::new("p-old").ok();
        old.created_at = base;

        let mut newer = transaction("ORD-2", EventKind::PurchaseApproved);
        newer.user_id = Some(user.clone());
        newer.partner_id = PartnerId::new("p-new").ok();
        newer.created_at = base.add_days(2).unwrap();

        let mut newest_unattributed = transaction("ORD-3", EventKind::PurchaseApproved);
        newest_unattributed.user_id = Some(user.clone());
        newest_unattributed.created_at = base.add_days(5).unwrap();

        for tx in [&old, &newer, &newest_unattributed] {
            repo.insert_if_absent(tx).await.unwrap();
        }

        let found = repo
            .find_latest_attributed_for_user(&user)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.partner_id.unwrap().as_str(), "p-new");
    }
}
