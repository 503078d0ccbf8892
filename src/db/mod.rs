//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Statement execution on a pool or a live transaction
//! - Row decoding and row counting
//! - Named parameter binding and argument serialization
//! - Database dispatch macros for reducing code duplication

#[macro_use]
mod macros;
pub mod executor;
pub(crate) mod fields;
pub mod named;
mod params;
pub mod pool;
pub mod rows;
pub mod transaction;

pub use executor::Executor;
pub use named::{BoundQuery, bulk_bind_vars};
pub use pool::DbPool;
pub use rows::{DbRow, Record, Row, RowCount, Rows};
pub use transaction::{DbTransaction, TxExecutor};
