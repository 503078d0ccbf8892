//! Call scope carried through a chain of accessor calls.
//!
//! A `Scope` is an immutable value: it holds at most one transaction binding
//! and an optional deadline. Deriving a child never changes the parent, so
//! independent operations cannot observe each other's transaction.

use crate::db::transaction::TxExecutor;
use crate::error::DbError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Scope {
    tx: Option<TxExecutor>,
    deadline: Option<Instant>,
}

impl Scope {
    /// An unbound scope with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Child scope that must finish by `deadline`.
    ///
    /// A child can only tighten its parent's deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            tx: self.tx.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    pub fn transaction(&self) -> Option<&TxExecutor> {
        self.tx.as_ref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.tx.as_ref().map(TxExecutor::id)
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) fn with_transaction(&self, tx: TxExecutor) -> Self {
        Self {
            tx: Some(tx),
            deadline: self.deadline,
        }
    }

    /// Run `fut` under this scope's deadline.
    ///
    /// Expiry drops `fut` and yields `DbError::DeadlineExceeded` for `operation`.
    pub(crate) async fn bounded<T, E, F>(&self, operation: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .unwrap_or_else(|_| Err(DbError::deadline_exceeded(operation).into())),
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scope_is_unbound() {
        let scope = Scope::new();
        assert!(!scope.in_transaction());
        assert_eq!(scope.transaction_id(), None);
        assert_eq!(scope.deadline(), None);
        assert!(!scope.is_expired());
    }

    #[tokio::test]
    async fn test_child_deadline_only_tightens() {
        let parent = Scope::new().with_timeout(Duration::from_secs(10));
        let looser = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(looser.deadline(), parent.deadline());

        let tighter = parent.with_timeout(Duration::from_secs(1));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn test_bounded_reports_deadline() {
        let scope = Scope::new().with_timeout(Duration::from_millis(10));
        let result: Result<(), DbError> = scope
            .bounded("sleep", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(DbError::DeadlineExceeded { .. })));
        assert!(scope.is_expired());
    }

    #[tokio::test]
    async fn test_bounded_without_deadline_passes_through() {
        let value = Scope::new()
            .bounded("noop", async { Ok::<_, DbError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
