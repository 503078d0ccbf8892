//! The public query surface.
//!
//! Every operation resolves its executor from the call scope, runs under the
//! scope's deadline, and reports one log line when a logger is configured.

use crate::config::{AccessorOptions, DatabaseConfig};
use crate::db::executor::Executor;
use crate::db::fields::to_field;
use crate::db::named::bind_named;
use crate::db::pool::DbPool;
use crate::db::rows::{Record, RowCount, Rows};
use crate::error::{DbError, DbResult};
use crate::format::{Command, LogRecord, choose_level, make_log_msg};
use crate::logger::Logger;
use crate::models::{DatabaseType, ExecResult, QueryParam};
use crate::scope::Scope;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scoped query accessor over a connection pool.
///
/// Cheap to clone; clones share the pool and the logger.
#[derive(Clone)]
pub struct Accessor {
    pool: DbPool,
    options: AccessorOptions,
    logger: Option<Arc<dyn Logger>>,
}

impl Accessor {
    /// Wrap an existing pool without checking connectivity.
    pub fn new(
        pool: impl Into<DbPool>,
        logger: Option<Arc<dyn Logger>>,
        options: AccessorOptions,
    ) -> Self {
        Self {
            pool: pool.into(),
            options,
            logger,
        }
    }

    /// Wrap an existing pool after a successful ping.
    pub async fn open(
        pool: impl Into<DbPool>,
        logger: Option<Arc<dyn Logger>>,
        options: AccessorOptions,
    ) -> DbResult<Self> {
        let accessor = Self::new(pool, logger, options);
        accessor.pool.ping().await?;
        Ok(accessor)
    }

    /// Connect from a database URL.
    ///
    /// Pool sizing and logging thresholds are read from the URL's query
    /// parameters (see [`DatabaseConfig::parse`]).
    pub async fn connect(url: &str, logger: Option<Arc<dyn Logger>>) -> DbResult<Self> {
        let config = DatabaseConfig::parse(url)?;
        let pool = DbPool::connect(&config).await?;
        let accessor = Self::new(pool, logger, config.accessor_options);
        accessor.pool.ping().await?;
        Ok(accessor)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// A copy that hides argument values in log lines.
    pub fn secret(&self) -> Self {
        let mut copy = self.clone();
        copy.options.hide_params = true;
        copy
    }

    pub fn options(&self) -> &AccessorOptions {
        &self.options
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    /// The executor serving the next statement issued with `scope`.
    pub fn build(&self, scope: &Scope) -> Executor {
        match scope.transaction() {
            Some(tx) => Executor::Transaction(tx.clone()),
            None => Executor::Pool(self.pool.clone()),
        }
    }

    /// Fetch exactly one row.
    ///
    /// Returns `DbError::NotFound` when nothing matches.
    pub async fn get<T: Record>(
        &self,
        scope: &Scope,
        query: &str,
        args: &[QueryParam],
    ) -> DbResult<T> {
        let executor = self.build(scope);
        let fetch = async {
            executor
                .fetch_optional(query, args)
                .await?
                .ok_or(DbError::NotFound)?
                .decode::<T>()
        };
        self.observe(scope, Command::Get, query, args, fetch, |_: &T| 1)
            .await
    }

    /// Fetch every matching row. An empty result is not an error.
    pub async fn select<T: Record>(
        &self,
        scope: &Scope,
        query: &str,
        args: &[QueryParam],
    ) -> DbResult<Vec<T>> {
        let executor = self.build(scope);
        let fetch = async {
            executor
                .fetch_all(query, args)
                .await?
                .iter()
                .map(|row| row.decode::<T>())
                .collect::<DbResult<Vec<T>>>()
        };
        self.observe(scope, Command::Select, query, args, fetch, |records: &Vec<T>| {
            records.len()
        })
        .await
    }

    pub async fn exec(
        &self,
        scope: &Scope,
        query: &str,
        args: &[QueryParam],
    ) -> DbResult<ExecResult> {
        let executor = self.build(scope);
        let run = executor.execute(query, args);
        self.observe(scope, Command::Exec, query, args, run, |result: &ExecResult| {
            result.row_count()
        })
        .await
    }

    /// Execute with `:name` placeholders bound from the fields of `arg`.
    ///
    /// A sequence argument repeats the `VALUES (...)` group once per element.
    /// The logged query and arguments are the rewritten positional ones.
    pub async fn named_exec<A: Serialize + ?Sized>(
        &self,
        scope: &Scope,
        query: &str,
        arg: &A,
    ) -> DbResult<ExecResult> {
        let executor = self.build(scope);
        let bound =
            to_field(arg).and_then(|field| bind_named(query, &field, executor.db_type()));
        let bound = match bound {
            Ok(bound) => bound,
            Err(err) => {
                self.emit(
                    scope,
                    &LogRecord {
                        command: Command::NamedExec,
                        query,
                        args: &[],
                        rows: 0,
                        error: Some(&err),
                        elapsed: Duration::ZERO,
                    },
                );
                return Err(err);
            }
        };

        let run = executor.execute(&bound.query, &bound.params);
        self.observe(
            scope,
            Command::NamedExec,
            &bound.query,
            &bound.params,
            run,
            |result: &ExecResult| result.row_count(),
        )
        .await
    }

    /// Run a query and return a cursor over its rows.
    ///
    /// The logged row count comes from a duplicate of the cursor; the
    /// returned cursor is untouched.
    pub async fn query(&self, scope: &Scope, query: &str, args: &[QueryParam]) -> DbResult<Rows> {
        let executor = self.build(scope);
        let fetch = async { executor.fetch_all(query, args).await.map(Rows::new) };
        self.observe(scope, Command::Query, query, args, fetch, |rows: &Rows| {
            rows.row_count()
        })
        .await
    }

    /// Await `fut` under the scope deadline, then time, count and log it.
    async fn observe<R, F, C>(
        &self,
        scope: &Scope,
        command: Command,
        query: &str,
        args: &[QueryParam],
        fut: F,
        count: C,
    ) -> DbResult<R>
    where
        F: Future<Output = DbResult<R>>,
        C: FnOnce(&R) -> usize,
    {
        let start = Instant::now();
        let result = scope.bounded(command.as_str(), fut).await;
        let elapsed = start.elapsed();

        if self.logger.is_some() {
            let (rows, error) = match &result {
                Ok(value) => (count(value), None),
                Err(err) => (0, Some(err)),
            };
            self.emit(
                scope,
                &LogRecord {
                    command,
                    query,
                    args,
                    rows,
                    error,
                    elapsed,
                },
            );
        }
        result
    }

    fn emit(&self, scope: &Scope, record: &LogRecord<'_>) {
        if let Some(logger) = &self.logger {
            let level = choose_level(record, &self.options);
            let msg = make_log_msg(record, self.options.hide_params);
            logger.log(level, scope, format_args!("{}", msg));
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("db_type", &self.pool.db_type())
            .field("options", &self.options)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
