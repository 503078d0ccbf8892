//! Parameter binding utilities for database queries.
//!
//! This module converts `QueryParam` slices into database-specific argument
//! buffers. The buffers own their values, so one binding path serves both pool
//! and transaction executors.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use sqlx::Arguments;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;

fn bind_error(index: usize, param: &QueryParam, err: sqlx::error::BoxDynError) -> DbError {
    DbError::invalid_input(format!(
        "Failed to bind parameter {} ({}): {}",
        index + 1,
        param.type_name(),
        err
    ))
}

/// Build MySQL arguments.
pub(crate) fn mysql_arguments(params: &[QueryParam]) -> DbResult<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for (index, param) in params.iter().enumerate() {
        let added = match param {
            QueryParam::Null => args.add(None::<String>),
            QueryParam::Bool(v) => args.add(*v),
            QueryParam::Int(v) => args.add(*v),
            QueryParam::Float(v) => args.add(*v),
            QueryParam::String(v) => args.add(v.clone()),
            QueryParam::Bytes(v) => args.add(v.clone()),
            QueryParam::Json(v) => args.add(Json(v.clone())),
        };
        added.map_err(|e| bind_error(index, param, e))?;
    }
    Ok(args)
}

/// Build PostgreSQL arguments.
pub(crate) fn postgres_arguments(params: &[QueryParam]) -> DbResult<PgArguments> {
    let mut args = PgArguments::default();
    for (index, param) in params.iter().enumerate() {
        let added = match param {
            QueryParam::Null => args.add(None::<String>),
            QueryParam::Bool(v) => args.add(*v),
            QueryParam::Int(v) => args.add(*v),
            QueryParam::Float(v) => args.add(*v),
            QueryParam::String(v) => args.add(v.clone()),
            QueryParam::Bytes(v) => args.add(v.clone()),
            QueryParam::Json(v) => args.add(Json(v.clone())),
        };
        added.map_err(|e| bind_error(index, param, e))?;
    }
    Ok(args)
}

/// Build SQLite arguments.
pub(crate) fn sqlite_arguments<'q>(params: &[QueryParam]) -> DbResult<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();
    for (index, param) in params.iter().enumerate() {
        let added = match param {
            QueryParam::Null => args.add(None::<String>),
            QueryParam::Bool(v) => args.add(*v),
            QueryParam::Int(v) => args.add(*v),
            QueryParam::Float(v) => args.add(*v),
            QueryParam::String(v) => args.add(v.clone()),
            QueryParam::Bytes(v) => args.add(v.clone()),
            // SQLite doesn't have native JSON type, store as string
            QueryParam::Json(v) => args.add(v.to_string()),
        };
        added.map_err(|e| bind_error(index, param, e))?;
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<QueryParam> {
        vec![
            QueryParam::Null,
            QueryParam::Bool(true),
            QueryParam::Int(1),
            QueryParam::Float(1.5),
            QueryParam::String("a".into()),
            QueryParam::Bytes(vec![1, 2]),
            QueryParam::Json(json!({"k": "v"})),
        ]
    }

    #[test]
    fn test_mysql_arguments_accepts_every_variant() {
        let args = mysql_arguments(&sample()).unwrap();
        assert_eq!(args.len(), 7);
    }

    #[test]
    fn test_postgres_arguments_accepts_every_variant() {
        let args = postgres_arguments(&sample()).unwrap();
        assert_eq!(args.len(), 7);
    }

    #[test]
    fn test_sqlite_arguments_accepts_every_variant() {
        let args = sqlite_arguments(&sample()).unwrap();
        assert_eq!(args.len(), 7);
    }
}
