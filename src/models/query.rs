//! Query-related data models.
//!
//! This module defines positional query arguments and statement results.

use humansize::{DECIMAL, format_size};
use serde_json::Value as JsonValue;
use std::fmt;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Bound as JSON on MySQL/PostgreSQL, as text on SQLite
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

/// Rendering used in query log lines.
impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::Bytes(v) => write!(f, "<{} blob>", format_size(v.len() as u64, DECIMAL)),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for QueryParam {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// Wide integers bind as `Int` when they fit in an `i64`. Larger values bind
/// as their exact decimal text, which every backend casts on insert.
macro_rules! impl_from_wide_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for QueryParam {
                fn from(value: $ty) -> Self {
                    i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Int)
                }
            }
        )+
    };
}

impl_from_wide_int!(i128, isize, u64, u128, usize);

impl From<bool> for QueryParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for QueryParam {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for QueryParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for QueryParam {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for QueryParam {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// `None` binds NULL, `Some(v)` binds `v` itself.
impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Scalars map onto their native parameter; arrays and objects stay JSON.
impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Self::Int(i),
                (None, Some(u), _) => Self::from(u),
                (None, None, Some(f)) => Self::Float(f),
                (None, None, None) => Self::String(n.to_string()),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Build a `Vec<QueryParam>` from heterogeneous values.
///
/// ```
/// use db_accessor::params;
///
/// let args = params![42, "alice", None::<i64>];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::models::QueryParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::QueryParam::from($value)),+]
    };
}

/// Outcome of a statement execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Last generated identifier. PostgreSQL never reports one; use `RETURNING`.
    pub last_insert_id: Option<i64>,
}

impl From<sqlx::mysql::MySqlQueryResult> for ExecResult {
    fn from(result: sqlx::mysql::MySqlQueryResult) -> Self {
        Self {
            rows_affected: result.rows_affected(),
            last_insert_id: i64::try_from(result.last_insert_id()).ok(),
        }
    }
}

impl From<sqlx::postgres::PgQueryResult> for ExecResult {
    fn from(result: sqlx::postgres::PgQueryResult) -> Self {
        Self {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        }
    }
}

impl From<sqlx::sqlite::SqliteQueryResult> for ExecResult {
    fn from(result: sqlx::sqlite::SqliteQueryResult) -> Self {
        Self {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        }
    }
}
