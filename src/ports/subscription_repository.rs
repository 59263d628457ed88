//! Subscription repository port (write side).

use async_trait::async_trait;

use crate::domain::billing::{Provider, Subscription};
use crate::domain::foundation::{DomainError, MemberId, PartnerId};

/// Repository port for Subscription aggregate persistence.
///
/// Records are never deleted; terminal records stay as history.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Save a new subscription.
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if it doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Records for a member on one provider, newest first.
    ///
    /// With `partner = Some(p)` only records attributed to `p` are returned;
    /// with `None` every record of the member on that provider is.
    async fn find_for_member(
        &self,
        member_id: &MemberId,
        provider: Provider,
        partner: Option<&PartnerId>,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Every record of a member across providers, newest first.
    async fn find_by_member(&self, member_id: &MemberId) -> Result<Vec<Subscription>, DomainError>;
}
