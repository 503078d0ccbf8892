//! Data models shared by the accessor and the executor layer.

pub mod connection;
pub mod query;

pub use connection::DatabaseType;
pub use query::{ExecResult, QueryParam};
