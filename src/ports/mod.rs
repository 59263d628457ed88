//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `DocumentStore` - Generic collection store (the only persistence seam)
//! - `TransactionRepository` - Transaction records, insert-if-absent keyed by order
//! - `SubscriptionRepository` - Subscription aggregates
//! - `IdentityHintRepository` - Checkout-time attribution hints
//!
//! ## Collaborator Ports
//!
//! - `MemberDirectory`, `PartnerDirectory`, `ReferralLinkStore`
//! - `CardBillingReader`, `CheckoutReader` - Provider read APIs

mod directories;
mod document_store;
mod identity_hint_repository;
mod provider_readers;
mod subscription_repository;
mod transaction_repository;

pub use directories::{LinkAccess, MemberDirectory, MemberProfile, PartnerDirectory, ReferralLinkStore};
pub use document_store::{
    DocumentStore, Filter, FilterOp, OrderBy, SaveResult, SortDirection, StoredDocument,
};
pub use identity_hint_repository::IdentityHintRepository;
pub use provider_readers::{CardBillingReader, CheckoutReader, ProviderReadError};
pub use subscription_repository::SubscriptionRepository;
pub use transaction_repository::TransactionRepository;
