//! PostgreSQL adapter - JSONB document store backing every repository.

mod document_store;

pub use document_store::{create_pool, run_migrations, PostgresDocumentStore};
