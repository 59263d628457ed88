//! In-memory adapters for development and tests.

mod document_store;

pub use document_store::InMemoryDocumentStore;
