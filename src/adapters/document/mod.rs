//! Typed repositories over any [`DocumentStore`](crate::ports::DocumentStore).
//!
//! Each repository owns one collection and maps its aggregate to and from
//! JSON bodies. The same code runs over the in-memory store in tests and over
//! PostgreSQL in production.

mod codec;
mod directories;
mod identity_hint_repository;
mod subscription_repository;
mod transaction_repository;

pub use directories::{DocumentMemberDirectory, DocumentPartnerDirectory, DocumentReferralLinkStore};
pub use identity_hint_repository::DocumentIdentityHintRepository;
pub use subscription_repository::DocumentSubscriptionRepository;
pub use transaction_repository::DocumentTransactionRepository;

/// Collection names shared by every store backend.
pub mod collections {
    pub const TRANSACTIONS: &str = "transactions";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const IDENTITY_HINTS: &str = "identity_hints";
    pub const MEMBERS: &str = "members";
    pub const PARTNERS: &str = "partners";
    pub const PARTNER_LINKS: &str = "partner_links";
    pub const LINK_ACCESSES: &str = "link_accesses";
}
