//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-memory document store (development and tests)
//! - `postgres` - JSONB document store on PostgreSQL
//! - `document` - Typed repositories over any document store
//! - `providers` - Card-billing and checkout read clients
//! - `http` - Axum routes

pub mod document;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod providers;

pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
