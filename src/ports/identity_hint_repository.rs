//! Pending identity hint repository port.

use async_trait::async_trait;

use crate::domain::billing::PendingIdentityHint;
use crate::domain::foundation::{DomainError, HintId, MemberId};

/// Stores hints recorded at checkout so a later webhook can recover the
/// partner attribution.
///
/// Lookups return candidates newest first and may include expired hints;
/// callers filter on `expires_at`.
#[async_trait]
pub trait IdentityHintRepository: Send + Sync {
    async fn save(&self, hint: &PendingIdentityHint) -> Result<(), DomainError>;

    async fn find_for_user(&self, user_id: &MemberId) -> Result<Vec<PendingIdentityHint>, DomainError>;

    /// `email` must already be normalized.
    async fn find_for_email(&self, email: &str) -> Result<Vec<PendingIdentityHint>, DomainError>;

    /// Consumes a hint. Returns false if another request consumed it first.
    async fn delete(&self, id: &HintId) -> Result<bool, DomainError>;
}
