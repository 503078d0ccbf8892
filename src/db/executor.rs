//! Statement execution against a pool or an open transaction.

use crate::db::pool::DbPool;
use crate::db::rows::DbRow;
use crate::db::transaction::TxExecutor;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, ExecResult, QueryParam};

/// The live executor a statement runs on.
///
/// Produced by [`Accessor::build`](crate::Accessor::build) from the call scope.
#[derive(Debug, Clone)]
pub enum Executor {
    Pool(DbPool),
    Transaction(TxExecutor),
}

impl Executor {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            Executor::Pool(pool) => pool.db_type(),
            Executor::Transaction(tx) => tx.db_type(),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    /// Identifier of the bound transaction, if any.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Executor::Pool(_) => None,
            Executor::Transaction(tx) => Some(tx.id()),
        }
    }

    /// Fetch at most one row.
    pub(crate) async fn fetch_optional(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<DbRow>> {
        dispatch_executor!(self, |conn, args| {
            sqlx::query_with(sql, args(params)?)
                .fetch_optional(conn)
                .await
                .map(|row| row.map(DbRow::from))
                .map_err(DbError::from)
        })
    }

    /// Fetch every row of the result set.
    pub(crate) async fn fetch_all(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<DbRow>> {
        dispatch_executor!(self, |conn, args| {
            sqlx::query_with(sql, args(params)?)
                .fetch_all(conn)
                .await
                .map(|rows| rows.into_iter().map(DbRow::from).collect::<Vec<_>>())
                .map_err(DbError::from)
        })
    }

    /// Execute a statement that returns no rows.
    pub(crate) async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<ExecResult> {
        dispatch_executor!(self, |conn, args| {
            sqlx::query_with(sql, args(params)?)
                .execute(conn)
                .await
                .map(ExecResult::from)
                .map_err(DbError::from)
        })
    }
}

impl From<DbPool> for Executor {
    fn from(pool: DbPool) -> Self {
        Executor::Pool(pool)
    }
}

impl From<TxExecutor> for Executor {
    fn from(tx: TxExecutor) -> Self {
        Executor::Transaction(tx)
    }
}
