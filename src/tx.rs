//! Transactional execution.
//!
//! [`Accessor::run_in_tx`] begins a transaction, hands the caller a scope bound
//! to it, and ends it exactly once: commit when the closure succeeds, rollback
//! when it fails, panics, or runs past the scope deadline.

use crate::accessor::Accessor;
use crate::db::transaction::TxExecutor;
use crate::error::DbError;
use crate::scope::Scope;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of a transactional run.
///
/// `error` is the primary failure; `rollback_error` is set when the rollback
/// that followed it failed as well.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TxError<E> {
    pub error: E,
    pub rollback_error: Option<DbError>,
}

impl<E> TxError<E> {
    fn new(error: E) -> Self {
        Self {
            error,
            rollback_error: None,
        }
    }

    pub fn into_parts(self) -> (E, Option<DbError>) {
        (self.error, self.rollback_error)
    }
}

impl Accessor {
    /// Run `f` inside a new transaction.
    ///
    /// `f` receives a child scope; every accessor call made with it joins the
    /// transaction. A scope that is already bound is rejected with
    /// `DbError::NestedTransaction` and `f` is not called. A panic inside `f`
    /// is caught, the transaction rolled back, and the panic reported as
    /// `DbError::RecoveredFault`. A commit that finds the transaction already
    /// finished is not an error.
    pub async fn run_in_tx<T, E, F, Fut>(&self, scope: &Scope, f: F) -> Result<T, TxError<E>>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        if let Some(current) = scope.transaction_id() {
            warn!(transaction_id = %current, "Rejected nested transaction");
            return Err(TxError::new(DbError::nested_transaction(current).into()));
        }

        let transaction = scope
            .bounded("begin", self.pool().begin())
            .await
            .map_err(|e| TxError::new(E::from(e)))?;
        let tx = TxExecutor::new(transaction);
        info!(
            transaction_id = %tx.id(),
            db_type = %tx.db_type(),
            "Transaction started"
        );

        let child = scope.with_transaction(tx.clone());
        let work = async move {
            let bound = child.clone();
            bound.bounded("transaction", f(child)).await
        };

        match AssertUnwindSafe(work).catch_unwind().await {
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(transaction_id = %tx.id(), %message, "Transaction function panicked");
                let rollback_error = rollback(&tx).await;
                Err(TxError {
                    error: DbError::recovered_fault(message).into(),
                    rollback_error,
                })
            }
            Ok(Err(error)) => {
                let rollback_error = rollback(&tx).await;
                Err(TxError {
                    error,
                    rollback_error,
                })
            }
            Ok(Ok(value)) => match tx.commit().await {
                Ok(()) => {
                    info!(transaction_id = %tx.id(), "Transaction committed");
                    Ok(value)
                }
                Err(DbError::TransactionFinished { .. }) => {
                    debug!(transaction_id = %tx.id(), "Transaction already finished at commit");
                    Ok(value)
                }
                Err(e) => {
                    warn!(transaction_id = %tx.id(), error = %e, "Commit failed");
                    Err(TxError::new(e.into()))
                }
            },
        }
    }
}

async fn rollback(tx: &TxExecutor) -> Option<DbError> {
    match tx.rollback().await {
        Ok(()) => {
            info!(transaction_id = %tx.id(), "Transaction rolled back");
            None
        }
        Err(e) => {
            warn!(transaction_id = %tx.id(), error = %e, "Rollback failed");
            Some(e)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "(non-string panic)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    fn payload_of(f: impl FnOnce() + panic::UnwindSafe) -> Box<dyn Any + Send> {
        panic::catch_unwind(f).unwrap_err()
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        let payload = payload_of(|| panic!("static message"));
        assert_eq!(panic_message(&*payload), "static message");

        let payload = payload_of(|| panic!("formatted {}", 42));
        assert_eq!(panic_message(&*payload), "formatted 42");

        let payload = payload_of(|| panic::panic_any(7u32));
        assert_eq!(panic_message(&*payload), "(non-string panic)");
    }

    #[test]
    fn test_tx_error_display_and_parts() {
        let err = TxError {
            error: DbError::NotFound,
            rollback_error: Some(DbError::rollback_failed("tx_1", "reset")),
        };
        assert_eq!(err.to_string(), "No rows in result set");
        let (error, rollback_error) = err.into_parts();
        assert!(error.is_not_found());
        assert!(rollback_error.is_some());
    }
}
