//! Statement execution.
//!
//! Generic fetch/exec helpers over any sqlx executor, so autocommit pools and
//! open transactions share one code path per engine. Results land in a
//! [`Cursor`]: buffered rows for queries, affected-row and last-insert-id
//! accounting for writes.

use std::collections::VecDeque;

use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Postgres, Sqlite};
use tracing::debug;

use crate::db::params::{bind_postgres, bind_sqlite};
use crate::db::types::{
    decode_postgres_row, decode_sqlite_row, postgres_columns, sqlite_columns, ColumnMeta,
};
use crate::error::{Error, Result};
use crate::sql::Statement;
use crate::value::{Row, Value};

/// A materialized result cursor.
#[derive(Debug, Default)]
pub struct Cursor {
    /// Result column metadata, empty for writes and empty results.
    pub columns: Vec<ColumnMeta>,
    rows: VecDeque<Row>,
    rows_affected: u64,
    last_insert_id: Option<Value>,
}

impl Cursor {
    pub(crate) fn from_rows(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            rows_affected: 0,
            last_insert_id: None,
        }
    }

    pub(crate) fn from_write(rows_affected: u64, last_insert_id: Option<Value>) -> Self {
        Self {
            columns: Vec::new(),
            rows: VecDeque::new(),
            rows_affected,
            last_insert_id,
        }
    }

    /// Take the next row, or `None` when exhausted.
    pub fn fetchone(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Take up to `n` rows.
    pub fn fetchmany(&mut self, n: usize) -> Vec<Row> {
        let take = n.min(self.rows.len());
        self.rows.drain(..take).collect()
    }

    /// Take all remaining rows.
    pub fn fetchall(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Rows affected by a write operation.
    pub fn rowcount(&self) -> u64 {
        self.rows_affected
    }

    /// Rows remaining in the buffer.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The primary key reported for the last INSERT, if any.
    pub fn last_insert_id(&self) -> Option<&Value> {
        self.last_insert_id.as_ref()
    }

    /// Reshape every buffered row in place.
    pub(crate) fn map_rows(&mut self, f: impl Fn(Row) -> Row) {
        self.rows = self.rows.drain(..).map(f).collect();
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetchone()
    }
}

pub(crate) async fn fetch_sqlite<'e, E>(executor: E, stmt: &Statement) -> Result<Cursor>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(sql = %stmt.sql, params = stmt.params.len(), "executing query");
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = bind_sqlite(query, param);
    }
    let rows: Vec<SqliteRow> = query
        .fetch(executor)
        .try_collect()
        .await
        .map_err(|e| Error::from(e).with_statement(&stmt.sql, &stmt.params))?;
    let columns = rows.first().map(sqlite_columns).unwrap_or_default();
    let rows = rows.iter().map(decode_sqlite_row).collect();
    Ok(Cursor::from_rows(columns, rows))
}

pub(crate) async fn exec_sqlite<'e, E>(executor: E, stmt: &Statement) -> Result<Cursor>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(sql = %stmt.sql, params = stmt.params.len(), "executing write");
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = bind_sqlite(query, param);
    }
    let result = query
        .execute(executor)
        .await
        .map_err(|e| Error::from(e).with_statement(&stmt.sql, &stmt.params))?;
    Ok(Cursor::from_write(
        result.rows_affected(),
        Some(Value::Int(result.last_insert_rowid())),
    ))
}

pub(crate) async fn script_sqlite<'q, 'e, E>(executor: E, sql: &'q str) -> Result<()>
where
    'q: 'e,
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(sql = %sql, "executing script");
    sqlx::raw_sql(sql)
        .execute(executor)
        .await
        .map_err(|e| Error::from(e).with_statement(sql, &[]))?;
    Ok(())
}

/// Non-generic counterpart to [`script_sqlite`] for use on a borrowed
/// connection from within an `async_trait` method, where the generic form
/// hits sqlx's "implementation of `Executor` is not general enough" HRTB
/// limitation. Returning an eagerly-boxed future (rather than an `async fn`)
/// sidesteps that limitation.
pub(crate) fn script_sqlite_conn<'a>(
    conn: &'a mut SqliteConnection,
    sql: &'a str,
) -> futures_util::future::BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        debug!(sql = %sql, "executing script");
        sqlx::raw_sql(sql)
            .execute(conn)
            .await
            .map_err(|e| Error::from(e).with_statement(sql, &[]))?;
        Ok(())
    })
}

pub(crate) async fn fetch_postgres<'e, E>(executor: E, stmt: &Statement) -> Result<Cursor>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    debug!(sql = %stmt.sql, params = stmt.params.len(), "executing query");
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = bind_postgres(query, param);
    }
    let rows: Vec<PgRow> = query
        .fetch(executor)
        .try_collect()
        .await
        .map_err(|e| Error::from(e).with_statement(&stmt.sql, &stmt.params))?;
    let columns = rows.first().map(postgres_columns).unwrap_or_default();
    let rows = rows.iter().map(decode_postgres_row).collect();
    Ok(Cursor::from_rows(columns, rows))
}

pub(crate) async fn exec_postgres<'e, E>(executor: E, stmt: &Statement) -> Result<Cursor>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    debug!(sql = %stmt.sql, params = stmt.params.len(), "executing write");
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = bind_postgres(query, param);
    }
    let result = query
        .execute(executor)
        .await
        .map_err(|e| Error::from(e).with_statement(&stmt.sql, &stmt.params))?;
    Ok(Cursor::from_write(result.rows_affected(), None))
}

pub(crate) async fn script_postgres<'q, 'e, E>(executor: E, sql: &'q str) -> Result<()>
where
    'q: 'e,
    E: sqlx::Executor<'e, Database = Postgres>,
{
    debug!(sql = %sql, "executing script");
    sqlx::raw_sql(sql)
        .execute(executor)
        .await
        .map_err(|e| Error::from(e).with_statement(sql, &[]))?;
    Ok(())
}

/// Non-generic counterpart to [`script_postgres`]; see [`script_sqlite_conn`].
pub(crate) fn script_postgres_conn<'a>(
    conn: &'a mut PgConnection,
    sql: &'a str,
) -> futures_util::future::BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        debug!(sql = %sql, "executing script");
        sqlx::raw_sql(sql)
            .execute(conn)
            .await
            .map_err(|e| Error::from(e).with_statement(sql, &[]))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64) -> Row {
        Row::from_pairs(vec![("id".into(), Value::Int(id))])
    }

    #[test]
    fn test_cursor_fetch_discipline() {
        let mut cursor = Cursor::from_rows(
            vec![ColumnMeta {
                name: "id".into(),
                type_name: "INTEGER".into(),
            }],
            vec![row(1), row(2), row(3)],
        );
        assert_eq!(cursor.len(), 3);
        assert_eq!(cursor.fetchone().unwrap().get("id"), Some(&Value::Int(1)));
        assert_eq!(cursor.fetchmany(5).len(), 2);
        assert!(cursor.fetchone().is_none());
    }

    #[test]
    fn test_cursor_iteration() {
        let cursor = Cursor::from_rows(Vec::new(), vec![row(1), row(2)]);
        let ids: Vec<_> = cursor.map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(Value::Int(1)), Some(Value::Int(2))]);
    }

    #[test]
    fn test_write_cursor() {
        let cursor = Cursor::from_write(2, Some(Value::Int(7)));
        assert_eq!(cursor.rowcount(), 2);
        assert_eq!(cursor.last_insert_id(), Some(&Value::Int(7)));
        assert!(cursor.is_empty());
    }
}
