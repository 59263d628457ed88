//! IdempotencyGuard - records each provider order exactly once.
//!
//! Read, classify, then insert-if-absent. The insert is the concurrency
//! boundary: a delivery that loses the race re-reads the winner's record and
//! is classified against it, exactly like a later re-delivery.

use std::sync::Arc;

use crate::domain::billing::{
    assess, Assessment, BillingError, Disposition, EventKind, ResolvedIdentity, Transaction,
};
use crate::domain::foundation::{DomainError, Timestamp, TransactionId};
use crate::ports::{SaveResult, TransactionRepository};

/// What the guard did and what the dispatcher should do next.
#[derive(Debug, Clone)]
pub struct GuardDecision {
    /// The record as stored after this event.
    pub transaction: Transaction,
    pub assessment: Assessment,
}

impl GuardDecision {
    pub fn disposition(&self) -> Disposition {
        self.assessment.disposition
    }

    /// True when the subscription state machine should run.
    pub fn should_proceed(&self) -> bool {
        self.assessment.disposition.drives_subscription()
    }
}

pub struct IdempotencyGuard {
    transactions: Arc<dyn TransactionRepository>,
}

fn store_error(err: DomainError) -> BillingError {
    BillingError::TransactionStore(err.to_string())
}

impl IdempotencyGuard {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    /// Classifies `candidate` against the stored record and persists the
    /// outcome.
    ///
    /// # Errors
    ///
    /// `TransactionStore` when any Transaction read or write fails. The
    /// provider is expected to retry.
    pub async fn check_and_record(
        &self,
        candidate: Transaction,
        kind: EventKind,
        identity: &ResolvedIdentity,
    ) -> Result<GuardDecision, BillingError> {
        let keyed = !candidate.id.is_unkeyed();
        let existing = if keyed {
            self.find(&candidate.id).await?
        } else {
            None
        };

        let assessment = assess(existing.as_ref(), keyed, kind, identity);
        let existing = match existing {
            Some(existing) => existing,
            None => match self
                .transactions
                .insert_if_absent(&candidate)
                .await
                .map_err(store_error)?
            {
                SaveResult::Inserted => {
                    return Ok(GuardDecision {
                        transaction: candidate,
                        assessment,
                    })
                }
                SaveResult::AlreadyExists => {
                    tracing::debug!(
                        transaction_id = %candidate.id,
                        "Lost insert race; classifying against stored record"
                    );
                    self.find(&candidate.id).await?.ok_or_else(|| {
                        BillingError::TransactionStore(format!(
                            "Transaction {} reported existing but not found",
                            candidate.id
                        ))
                    })?
                }
            },
        };

        let assessment = assess(Some(&existing), true, kind, identity);
        let transaction = self.apply(existing, &assessment, kind).await?;
        Ok(GuardDecision {
            transaction,
            assessment,
        })
    }

    async fn find(&self, id: &TransactionId) -> Result<Option<Transaction>, BillingError> {
        self.transactions.find_by_id(id).await.map_err(store_error)
    }

    /// Writes the identity patch and, for status-moving events, the new
    /// status. Everything else on the record is left alone.
    async fn apply(
        &self,
        mut transaction: Transaction,
        assessment: &Assessment,
        kind: EventKind,
    ) -> Result<Transaction, BillingError> {
        let now = Timestamp::now();
        let records_event = matches!(
            assessment.disposition,
            Disposition::Confirmation | Disposition::StatusChange
        );

        if assessment.should_update_identity() {
            transaction.apply_identity(&assessment.identity_patch, now);
            if !records_event {
                self.transactions
                    .patch_identity(&transaction.id, &assessment.identity_patch)
                    .await
                    .map_err(store_error)?;
            }
        }
        if records_event {
            transaction.record_event(kind, now);
            self.transactions
                .update(&transaction)
                .await
                .map_err(store_error)?;
        }
        Ok(transaction)
    }
}
