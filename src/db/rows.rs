//! Fetched rows, record decoding, and row counting.

use crate::error::DbResult;
use crate::models::{ExecResult, QueryParam};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, FromRow, Row as _};
use std::any::TypeId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// A type that can be decoded from a row of any supported backend.
///
/// `#[derive(sqlx::FromRow)]` structs and tuples of portable column types
/// such as `(i64, String)` satisfy this automatically.
pub trait Record:
    for<'r> FromRow<'r, MySqlRow>
    + for<'r> FromRow<'r, PgRow>
    + for<'r> FromRow<'r, SqliteRow>
    + Send
    + Unpin
{
}

impl<T> Record for T where
    T: for<'r> FromRow<'r, MySqlRow>
        + for<'r> FromRow<'r, PgRow>
        + for<'r> FromRow<'r, SqliteRow>
        + Send
        + Unpin
{
}

/// Database-specific row.
pub enum DbRow {
    MySql(MySqlRow),
    Postgres(PgRow),
    SQLite(SqliteRow),
}

impl DbRow {
    pub fn decode<T: Record>(&self) -> DbResult<T> {
        let record = match self {
            DbRow::MySql(row) => <T as FromRow<'_, MySqlRow>>::from_row(row)?,
            DbRow::Postgres(row) => <T as FromRow<'_, PgRow>>::from_row(row)?,
            DbRow::SQLite(row) => <T as FromRow<'_, SqliteRow>>::from_row(row)?,
        };
        Ok(record)
    }

    pub fn len(&self) -> usize {
        match self {
            DbRow::MySql(row) => row.len(),
            DbRow::Postgres(row) => row.len(),
            DbRow::SQLite(row) => row.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in select-list order.
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            DbRow::MySql(row) => row.columns().iter().map(|c| c.name()).collect(),
            DbRow::Postgres(row) => row.columns().iter().map(|c| c.name()).collect(),
            DbRow::SQLite(row) => row.columns().iter().map(|c| c.name()).collect(),
        }
    }
}

impl fmt::Debug for DbRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self {
            DbRow::MySql(_) => "MySql",
            DbRow::Postgres(_) => "Postgres",
            DbRow::SQLite(_) => "SQLite",
        };
        f.debug_struct("DbRow")
            .field("backend", &backend)
            .field("columns", &self.column_names())
            .finish()
    }
}

impl From<MySqlRow> for DbRow {
    fn from(row: MySqlRow) -> Self {
        DbRow::MySql(row)
    }
}

impl From<PgRow> for DbRow {
    fn from(row: PgRow) -> Self {
        DbRow::Postgres(row)
    }
}

impl From<SqliteRow> for DbRow {
    fn from(row: SqliteRow) -> Self {
        DbRow::SQLite(row)
    }
}

/// Forward-only cursor over a fetched result set.
///
/// The rows are shared; cloning a cursor copies only its position, so a clone
/// can be drained without moving the original.
#[derive(Clone, Debug)]
pub struct Rows {
    rows: Arc<[DbRow]>,
    position: usize,
}

impl Rows {
    pub(crate) fn new(rows: Vec<DbRow>) -> Self {
        Self {
            rows: rows.into(),
            position: 0,
        }
    }

    /// Rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Column names of the result set, empty when no row was returned.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.column_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Decode every remaining row.
    pub fn decode_all<T: Record>(self) -> DbResult<Vec<T>> {
        self.map(|row| row.decode()).collect()
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.position >= self.rows.len() {
            return None;
        }
        let row = Row {
            rows: Arc::clone(&self.rows),
            index: self.position,
        };
        self.position += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for Rows {}

/// One row yielded by [`Rows`].
#[derive(Clone)]
pub struct Row {
    rows: Arc<[DbRow]>,
    index: usize,
}

impl Row {
    pub fn decode<T: Record>(&self) -> DbResult<T> {
        self.raw().decode()
    }

    pub fn raw(&self) -> &DbRow {
        &self.rows[self.index]
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("index", &self.index)
            .field("row", self.raw())
            .finish()
    }
}

/// Number of rows a result represents, for log lines and thresholds.
pub trait RowCount {
    fn row_count(&self) -> usize;
}

impl<T: RowCount + ?Sized> RowCount for &T {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }
}

impl<T: RowCount + ?Sized> RowCount for Box<T> {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }
}

impl<T: RowCount + ?Sized> RowCount for Arc<T> {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }
}

impl<T: RowCount> RowCount for Option<T> {
    fn row_count(&self) -> usize {
        self.as_ref().map_or(0, RowCount::row_count)
    }
}

macro_rules! impl_single_row {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl RowCount for $ty {
                fn row_count(&self) -> usize {
                    1
                }
            }
        )+
    };
}

impl_single_row!(
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    bool,
    char,
    str,
    String,
    serde_json::Value,
    QueryParam,
    DbRow,
    Row,
);

impl RowCount for ExecResult {
    fn row_count(&self) -> usize {
        usize::try_from(self.rows_affected).unwrap_or(usize::MAX)
    }
}

impl RowCount for Rows {
    fn row_count(&self) -> usize {
        self.clone().count()
    }
}

/// A byte buffer is one value, not a sequence of rows.
fn is_byte_buffer<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<u8>()
}

fn sequence_len<T: 'static>(len: usize) -> usize {
    if is_byte_buffer::<T>() { 1 } else { len }
}

impl<T: 'static> RowCount for [T] {
    fn row_count(&self) -> usize {
        sequence_len::<T>(self.len())
    }
}

impl<T: 'static, const N: usize> RowCount for [T; N] {
    fn row_count(&self) -> usize {
        sequence_len::<T>(N)
    }
}

impl<T: 'static> RowCount for Vec<T> {
    fn row_count(&self) -> usize {
        sequence_len::<T>(self.len())
    }
}

impl<T: 'static> RowCount for VecDeque<T> {
    fn row_count(&self) -> usize {
        sequence_len::<T>(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::SqlitePool;

    async fn sample_rows() -> Rows {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let rows = sqlx::query("SELECT 1 AS id, 'a' AS name UNION ALL SELECT 2, 'b'")
            .fetch_all(&pool)
            .await
            .unwrap();
        Rows::new(rows.into_iter().map(DbRow::from).collect())
    }

    #[test]
    fn test_scalars_count_one() {
        assert_eq!(10i32.row_count(), 1);
        assert_eq!(1.5f64.row_count(), 1);
        assert_eq!(true.row_count(), 1);
        assert_eq!("".row_count(), 1);
        assert_eq!(String::from("abc").row_count(), 1);
        assert_eq!(json!({"a": 1}).row_count(), 1);
        assert_eq!(QueryParam::Null.row_count(), 1);
    }

    #[test]
    fn test_bytes_count_one() {
        let bytes = b"asf".to_vec();
        assert_eq!(bytes.row_count(), 1);
        assert_eq!((&bytes[..]).row_count(), 1);
        assert_eq!(b"asf".row_count(), 1);
        assert_eq!(Vec::<u8>::new().row_count(), 1);
        assert_eq!(VecDeque::from(bytes.clone()).row_count(), 1);
        assert_eq!(Some(bytes.clone()).row_count(), 1);
        assert_eq!(None::<Vec<u8>>.row_count(), 0);
        assert_eq!(Box::new(bytes).row_count(), 1);

        // Other element types still count their length.
        assert_eq!(vec![1i8, 2, 3].row_count(), 3);
        assert_eq!(vec![b"ab".to_vec(), b"cd".to_vec()].row_count(), 2);
    }

    #[test]
    fn test_option_and_pointers() {
        assert_eq!(None::<i32>.row_count(), 0);
        assert_eq!(Some(5u8).row_count(), 1);
        assert_eq!(Some(vec![1, 2, 3]).row_count(), 3);
        assert_eq!(None::<Vec<i32>>.row_count(), 0);

        let value = 7i64;
        assert_eq!((&value).row_count(), 1);
        assert_eq!(Box::new(vec![1, 2]).row_count(), 2);
        assert_eq!(Arc::new(Some(1usize)).row_count(), 1);
    }

    #[test]
    fn test_collections_count_length_not_capacity() {
        let mut v = Vec::with_capacity(64);
        v.extend([1, 2, 3]);
        assert_eq!(v.row_count(), 3);
        assert_eq!(Vec::<i32>::new().row_count(), 0);
        assert_eq!([1, 2, 3, 4].row_count(), 4);
        assert_eq!(v[..2].row_count(), 2);
        assert_eq!(VecDeque::from([1, 2]).row_count(), 2);
    }

    #[test]
    fn test_exec_result_counts_affected_rows() {
        let result = ExecResult {
            rows_affected: 4,
            last_insert_id: None,
        };
        assert_eq!(result.row_count(), 4);
        assert_eq!(ExecResult::default().row_count(), 0);
    }

    #[tokio::test]
    async fn test_counting_rows_leaves_cursor_intact() {
        let mut rows = sample_rows().await;
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.remaining(), 2);

        let first = rows.next().unwrap();
        assert_eq!(first.row_count(), 1);
        assert_eq!(rows.row_count(), 1);
        assert_eq!(rows.remaining(), 1);
    }

    #[tokio::test]
    async fn test_rows_decode() {
        let rows = sample_rows().await;
        assert_eq!(rows.columns(), vec!["id", "name"]);

        let records: Vec<(i64, String)> = rows.clone().decode_all().unwrap();
        assert_eq!(records, vec![(1, "a".to_string()), (2, "b".to_string())]);

        let first: (i64, String) = rows.clone().next().unwrap().decode().unwrap();
        assert_eq!(first.0, 1);
        assert_eq!(rows.remaining(), 2);
    }

    #[tokio::test]
    async fn test_empty_rows() {
        let rows = Rows::new(Vec::new());
        assert!(rows.is_exhausted());
        assert!(rows.columns().is_empty());
        assert_eq!(rows.row_count(), 0);
    }
}
