//! JSON body mapping shared by the document repositories.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::StoredDocument;

pub(super) fn to_body<T: Serialize>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value).map_err(DomainError::from)
}

pub(super) fn from_document<T: DeserializeOwned>(
    collection: &str,
    doc: StoredDocument,
) -> Result<T, DomainError> {
    serde_json::from_value(doc.body).map_err(|e| {
        DomainError::serialization(format!("Corrupt document {}/{}: {}", collection, doc.id, e))
    })
}

/// Re-labels a store `NotFound` with an aggregate-specific code.
pub(super) fn relabel_not_found(err: DomainError, code: ErrorCode) -> DomainError {
    if err.code == ErrorCode::NotFound {
        DomainError::new(code, err.message)
    } else {
        err
    }
}
