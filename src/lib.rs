//! Scoped transactional query accessor.
//!
//! An [`Accessor`] routes each statement either to the connection pool or to
//! the transaction bound to the caller's [`Scope`], and logs one line per
//! statement with its timing, row count and arguments.
//!
//! ```no_run
//! use db_accessor::{Accessor, DbError, Scope, TracingLogger, params};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), DbError> {
//! let db = Accessor::connect("sqlite:app.db", Some(Arc::new(TracingLogger))).await?;
//! let scope = Scope::new();
//!
//! let id = db
//!     .run_in_tx(&scope, |tx| {
//!         let db = db.clone();
//!         async move {
//!             let res = db
//!                 .exec(&tx, "INSERT INTO users (name) VALUES (?)", &params!["alice"])
//!                 .await?;
//!             Ok::<_, DbError>(res.last_insert_id)
//!         }
//!     })
//!     .await
//!     .map_err(|e| e.error)?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logger;
pub mod models;
pub mod scope;
pub mod tx;

pub use accessor::Accessor;
pub use config::{AccessorOptions, DatabaseConfig, PoolOptions};
pub use db::{Executor, Record, RowCount, Rows, bulk_bind_vars};
pub use error::{DbError, DbResult};
pub use format::{Command, LogRecord, choose_level, make_log_msg};
pub use logger::{Level, Logger, TracingLogger, WriterLogger};
pub use models::{DatabaseType, ExecResult, QueryParam};
pub use scope::Scope;
pub use tx::TxError;
