//! DocumentStore port - generic collection store.
//!
//! The billing core treats persistence as a set of named collections of JSON
//! documents. Adapters provide the storage; typed repositories are layered on
//! top in `adapters::document`.
//!
//! ## Concurrency
//!
//! `insert_with_id` must be an atomic insert-if-absent. It is the only
//! cross-process coordination the webhook pipeline relies on: the
//! Transaction document id is derived from `(provider, order_id)`, so a
//! concurrent duplicate delivery observes `SaveResult::AlreadyExists`.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;

use crate::domain::foundation::DomainError;

/// Result of attempting an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this id).
    Inserted,
    /// A record with this id already exists (lost the race or re-delivery).
    AlreadyExists,
}

/// A single predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    IsNull,
    NotNull,
}

/// Conjunction of field predicates. A missing field counts as null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, FilterOp)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), FilterOp::Eq(value.into())));
        self
    }

    pub fn is_null(mut self, field: impl Into<String>) -> Self {
        self.clauses.push((field.into(), FilterOp::IsNull));
        self
    }

    pub fn not_null(mut self, field: impl Into<String>) -> Self {
        self.clauses.push((field.into(), FilterOp::NotNull));
        self
    }

    pub fn clauses(&self) -> &[(String, FilterOp)] {
        &self.clauses
    }

    /// Evaluates the filter against a document body.
    pub fn matches(&self, body: &Value) -> bool {
        self.clauses.iter().all(|(field, op)| {
            let value = body.get(field).unwrap_or(&Value::Null);
            match op {
                FilterOp::Eq(expected) => value == expected,
                FilterOp::IsNull => value.is_null(),
                FilterOp::NotNull => !value.is_null(),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort on one top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Compares two documents on this field. Nulls sort first ascending.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = compare_values(
            a.get(&self.field).unwrap_or(&Value::Null),
            b.get(&self.field).unwrap_or(&Value::Null),
        );
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// A stored document and its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
}

/// Port for the external document/collection store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, DomainError>;

    /// First document matching `filter` (store order).
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, DomainError>;

    /// All documents matching `filter`, optionally sorted and limited.
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, DomainError>;

    /// Inserts with a store-generated id and returns it.
    async fn insert(&self, collection: &str, body: Value) -> Result<String, DomainError>;

    /// Atomic insert-if-absent under a caller-chosen id.
    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, DomainError>;

    /// Shallow-merges `partial` into the stored document.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the document doesn't exist
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), DomainError>;

    /// Deletes a document. Returns false if it did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DomainError>;

    /// Atomically adds `delta` to a numeric field and returns the new value.
    /// A missing field starts at zero.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, DomainError>;
}
