//! Transaction executor bound to one live backend transaction.
//!
//! A `TxExecutor` is the value carried by a [`Scope`](crate::scope::Scope)
//! while a transactional function runs. Clones share the same transaction.
//! The transaction sits in a take-once slot: commit and rollback empty it, and
//! every later use reports `DbError::TransactionFinished`.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }
}

#[derive(Clone)]
pub struct TxExecutor {
    id: Arc<str>,
    db_type: DatabaseType,
    slot: Arc<Mutex<Option<DbTransaction>>>,
}

impl TxExecutor {
    pub(crate) fn new(transaction: DbTransaction) -> Self {
        Self {
            id: generate_transaction_id().into(),
            db_type: transaction.db_type(),
            slot: Arc::new(Mutex::new(Some(transaction))),
        }
    }

    /// Unique transaction identifier, `tx_` followed by 32 hex characters.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// True once the transaction has been committed or rolled back.
    pub async fn is_finished(&self) -> bool {
        self.slot.lock().await.is_none()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<DbTransaction>> {
        self.slot.lock().await
    }

    fn take(&self, slot: &mut Option<DbTransaction>) -> DbResult<DbTransaction> {
        slot.take().ok_or_else(|| DbError::transaction_finished(self.id()))
    }

    /// Commit and empty the slot.
    pub(crate) async fn commit(&self) -> DbResult<()> {
        let tx = {
            let mut slot = self.slot.lock().await;
            self.take(&mut slot)?
        };
        tx.commit().await
    }

    /// Roll back and empty the slot.
    ///
    /// Backend failures are reported as `DbError::RollbackFailed`.
    pub(crate) async fn rollback(&self) -> DbResult<()> {
        let tx = {
            let mut slot = self.slot.lock().await;
            self.take(&mut slot)?
        };
        tx.rollback()
            .await
            .map_err(|e| DbError::rollback_failed(self.id(), e.to_string()))
    }
}

impl fmt::Debug for TxExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxExecutor")
            .field("id", &self.id)
            .field("db_type", &self.db_type)
            .finish()
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
