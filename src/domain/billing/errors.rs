//! Error types for payment-event reconciliation and billing reads.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ValidationError};

/// Errors surfaced by the billing handlers.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Request body is not a parseable event envelope.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// `X-Webhook-Signature` missing or wrong.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The Transaction write (the idempotency anchor) failed.
    #[error("Transaction store failure: {0}")]
    TransactionStore(String),

    /// A store operation outside the Transaction write failed.
    #[error("Store failure: {0}")]
    Store(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl BillingError {
    /// True if the provider should redeliver the event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::MalformedPayload(_)
                | BillingError::TransactionStore(_)
                | BillingError::Store(_)
        )
    }

    /// Maps the error to an HTTP status code.
    ///
    /// Providers retry on 5xx, so retryable errors map there.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InvalidSignature => StatusCode::UNAUTHORIZED,
            BillingError::MemberNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::MalformedPayload(_)
            | BillingError::TransactionStore(_)
            | BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BillingError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            BillingError::InvalidSignature => "INVALID_SIGNATURE",
            BillingError::TransactionStore(_) => "TRANSACTION_STORE_FAILURE",
            BillingError::Store(_) => "STORE_FAILURE",
            BillingError::MemberNotFound(_) => "MEMBER_NOT_FOUND",
            BillingError::Validation(_) => "VALIDATION_FAILED",
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::Validation(err.to_string())
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        BillingError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_is_retryable_500() {
        let err = BillingError::MalformedPayload("eof".into());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transaction_store_failure_is_retryable_500() {
        let err = BillingError::TransactionStore("timeout".into());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_signature_is_not_retried() {
        let err = BillingError::InvalidSignature;
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    #[test]
    fn member_not_found_is_404() {
        assert_eq!(
            BillingError::MemberNotFound("u-1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_error_converts() {
        let err: BillingError = ValidationError::empty_field("member_id").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("member_id"));
    }
}
