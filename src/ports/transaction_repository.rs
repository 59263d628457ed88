//! Transaction repository port.
//!
//! Transactions are keyed by `TransactionId`, which for keyed orders is
//! `"{provider}:{order_id}"`. `insert_if_absent` is the idempotency anchor.

use async_trait::async_trait;

use super::SaveResult;
use crate::domain::billing::{IdentityPatch, Transaction};
use crate::domain::foundation::{DomainError, MemberId, TransactionId};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError>;

    /// Inserts unless a transaction with the same id exists.
    async fn insert_if_absent(&self, transaction: &Transaction) -> Result<SaveResult, DomainError>;

    /// Replaces the stored record.
    async fn update(&self, transaction: &Transaction) -> Result<(), DomainError>;

    /// Sets only the fields present in `patch`.
    async fn patch_identity(
        &self,
        id: &TransactionId,
        patch: &IdentityPatch,
    ) -> Result<(), DomainError>;

    /// Most recent transaction of `user_id` that carries a partner.
    async fn find_latest_attributed_for_user(
        &self,
        user_id: &MemberId,
    ) -> Result<Option<Transaction>, DomainError>;
}
