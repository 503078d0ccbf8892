//! Executor dispatch macro for reducing code duplication.
//!
//! Every statement runs against one of six concrete sqlx executors: a pool or
//! an open transaction, for each of the three backends. The macro expands a
//! single body once per executor so the statement code reads linearly.

/// Expand `$body` for every executor variant.
///
/// Inside the body, `$conn` is bound to the concrete sqlx executor
/// (`&MySqlPool`, `&mut MySqlConnection`, ...) and `$args` to the matching
/// argument builder from [`crate::db::params`].
///
/// A transaction executor holds its slot lock for the duration of the body.
/// An empty slot yields `DbError::TransactionFinished`.
///
/// # Example
///
/// ```ignore
/// dispatch_executor!(self, |conn, args| {
///     sqlx::query_with(sql, args(params)?)
///         .execute(conn)
///         .await
///         .map(ExecResult::from)
///         .map_err(DbError::from)
/// })
/// ```
macro_rules! dispatch_executor {
    ($executor:expr, |$conn:ident, $args:ident| $body:expr) => {
        match $executor {
            $crate::db::executor::Executor::Pool(pool) => match pool {
                $crate::db::pool::DbPool::MySql($conn) => {
                    let $args = $crate::db::params::mysql_arguments;
                    $body
                }
                $crate::db::pool::DbPool::Postgres($conn) => {
                    let $args = $crate::db::params::postgres_arguments;
                    $body
                }
                $crate::db::pool::DbPool::SQLite($conn) => {
                    let $args = $crate::db::params::sqlite_arguments;
                    $body
                }
            },
            $crate::db::executor::Executor::Transaction(tx) => {
                let mut slot = tx.lock().await;
                match slot.as_mut() {
                    Some($crate::db::transaction::DbTransaction::MySql(open)) => {
                        let $conn = &mut **open;
                        let $args = $crate::db::params::mysql_arguments;
                        $body
                    }
                    Some($crate::db::transaction::DbTransaction::Postgres(open)) => {
                        let $conn = &mut **open;
                        let $args = $crate::db::params::postgres_arguments;
                        $body
                    }
                    Some($crate::db::transaction::DbTransaction::SQLite(open)) => {
                        let $conn = &mut **open;
                        let $args = $crate::db::params::sqlite_arguments;
                        $body
                    }
                    None => Err($crate::error::DbError::transaction_finished(tx.id())),
                }
            }
        }
    };
}
