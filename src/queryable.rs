//! The abstract operation surface.
//!
//! [`Queryable`] is implemented by [`Database`](crate::Database) and
//! [`Transaction`](crate::Transaction). Implementors supply the low-level
//! hooks (dialect, schema lookup, raw statement execution); the operation
//! surface itself lives in provided methods sharing one pipeline: normalize
//! arguments, assemble SQL, adapt outbound parameters, run, convert inbound
//! cells, apply the row factory.

use async_trait::async_trait;

use crate::bind::{self, Record};
use crate::db::executor::Cursor;
use crate::db::schema::TableSchema;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::registry::{self, RowFactory};
use crate::sql::args::{Select, Target, Values, Where};
use crate::sql::{assemble, Context, Op, Statement};
use crate::value::{Params, Row, Value};

/// The shared operation surface of databases and transactions.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// The backend engine.
    fn engine(&self) -> Engine;

    /// Schema name prefixed onto unqualified table names, if configured.
    fn schema_prefix(&self) -> Option<String> {
        None
    }

    /// The owning database's row factory, if set.
    fn instance_row_factory(&self) -> Option<RowFactory> {
        None
    }

    /// Cached metadata for a table, resolved case-insensitively.
    async fn table_schema(&self, table: &str) -> Result<Option<TableSchema>>;

    /// Run an assembled statement expecting result rows.
    async fn raw_fetch(&self, stmt: Statement) -> Result<Cursor>;

    /// Run an assembled statement expecting a write outcome.
    async fn raw_exec(&self, stmt: Statement) -> Result<Cursor>;

    /// Run a multi-statement script.
    async fn raw_script(&self, sql: &str) -> Result<()>;

    /// Return the identifier quoted for this engine. Quoting is unconditional
    /// and idempotent.
    fn quote(&self, name: &str) -> String {
        self.engine().dialect().quote(name, true)
    }

    /// SELECT returning a result cursor.
    async fn select<T>(&self, target: T, query: Select) -> Result<Cursor>
    where
        T: Into<Target> + Send,
    {
        let target = target.into();
        let stmt = build(self, Op::Select, &target, &query, &Values::new()).await?;
        let cursor = self.raw_fetch(stmt).await?;
        let cursor = convert_cursor(self, cursor, Some(&target)).await?;
        Ok(apply_row_factory(self, cursor))
    }

    /// SELECT and fetch every row.
    async fn fetchall<T>(&self, target: T, query: Select) -> Result<Vec<Row>>
    where
        T: Into<Target> + Send,
    {
        let mut cursor = self.select(target, query).await?;
        Ok(cursor.fetchall())
    }

    /// SELECT and fetch the first row, if any. Applies `LIMIT 1` when the
    /// query has no limit of its own.
    async fn fetchone<T>(&self, target: T, query: Select) -> Result<Option<Row>>
    where
        T: Into<Target> + Send,
    {
        let mut cursor = self.select(target, limit_one(query)).await?;
        Ok(cursor.fetchone())
    }

    /// INSERT, returning the backend-reported primary key, if any.
    async fn insert<T, V>(&self, target: T, values: V) -> Result<Option<Value>>
    where
        T: Into<Target> + Send,
        V: Into<Values> + Send,
    {
        let target = target.into();
        let values = values.into();
        do_insert(self, &target, &values).await
    }

    /// INSERT each value set in turn, returning the reported primary keys.
    async fn insertmany<T>(&self, target: T, rows: Vec<Values>) -> Result<Vec<Option<Value>>>
    where
        T: Into<Target> + Send,
    {
        let target = target.into();
        let mut keys = Vec::with_capacity(rows.len());
        for values in &rows {
            keys.push(do_insert(self, &target, values).await?);
        }
        Ok(keys)
    }

    /// UPDATE, returning the affected row count.
    async fn update<T, V, W>(&self, target: T, values: V, where_: W) -> Result<u64>
    where
        T: Into<Target> + Send,
        V: Into<Values> + Send,
        W: Into<Where> + Send,
    {
        let target = target.into();
        let stmt = build(
            self,
            Op::Update,
            &target,
            &Select::new().filter(where_.into()),
            &values.into(),
        )
        .await?;
        Ok(self.raw_exec(stmt).await?.rowcount())
    }

    /// DELETE, returning the affected row count.
    async fn delete<T, W>(&self, target: T, where_: W) -> Result<u64>
    where
        T: Into<Target> + Send,
        W: Into<Where> + Send,
    {
        let target = target.into();
        let stmt = build(
            self,
            Op::Delete,
            &target,
            &Select::new().filter(where_.into()),
            &Values::new(),
        )
        .await?;
        Ok(self.raw_exec(stmt).await?.rowcount())
    }

    /// Execute raw SQL. Parameters may be positional, or named for `:name`
    /// placeholders. The SQL passes through verbatim; the caller owns dialect
    /// compatibility.
    async fn execute<P>(&self, sql: &str, params: P) -> Result<Cursor>
    where
        P: Into<Params> + Send,
    {
        let dialect = self.engine().dialect();
        let (sql, values) = params.into().render(sql, |n| dialect.placeholder(n))?;
        let stmt = Statement {
            sql,
            params: values.into_iter().map(registry::adapt).collect(),
        };
        let cursor = if is_query(&stmt.sql) {
            self.raw_fetch(stmt).await?
        } else {
            self.raw_exec(stmt).await?
        };
        let cursor = convert_cursor(self, cursor, None).await?;
        Ok(apply_row_factory(self, cursor))
    }

    /// Execute raw SQL once per parameter set, returning the last cursor.
    async fn executemany(&self, sql: &str, params: Vec<Params>) -> Result<Cursor> {
        let mut last = Cursor::default();
        for set in params {
            last = self.execute(sql, set).await?;
        }
        Ok(last)
    }

    /// Execute a script of `;`-separated statements, outside any parameter
    /// binding. Invalidates the schema metadata cache.
    async fn executescript(&self, sql: &str) -> Result<()> {
        self.raw_script(sql).await
    }

    /// SELECT rows materialized as record instances. The record target
    /// supersedes any registered row factory.
    async fn fetchall_as<R>(&self, query: Select) -> Result<Vec<R>>
    where
        R: Record + Send,
    {
        let target = bind::target_of::<R>();
        let stmt = build(self, Op::Select, &target, &query, &Values::new()).await?;
        let cursor = self.raw_fetch(stmt).await?;
        let mut cursor = convert_cursor(self, cursor, Some(&target)).await?;
        cursor
            .fetchall()
            .iter()
            .map(bind::record_from_row)
            .collect()
    }

    /// SELECT the first row materialized as a record instance.
    async fn fetchone_as<R>(&self, query: Select) -> Result<Option<R>>
    where
        R: Record + Send,
    {
        let target = bind::target_of::<R>();
        let stmt = build(
            self,
            Op::Select,
            &target,
            &limit_one(query),
            &Values::new(),
        )
        .await?;
        let cursor = self.raw_fetch(stmt).await?;
        let mut cursor = convert_cursor(self, cursor, Some(&target)).await?;
        cursor
            .fetchone()
            .as_ref()
            .map(bind::record_from_row)
            .transpose()
    }

    /// INSERT a record instance, returning the reported primary key. A null
    /// primary key field is omitted so the backend assigns it.
    async fn insert_record<R>(&self, record: &R) -> Result<Option<Value>>
    where
        R: Record + Sync,
    {
        let target = bind::target_of::<R>();
        let values = bind::values_of(record)?;
        do_insert(self, &target, &values).await
    }
}

/// Force `LIMIT 1` onto an unlimited query.
pub(crate) fn limit_one(mut query: Select) -> Select {
    if query.limit.is_none() {
        query.limit = crate::sql::args::Limit::count(1);
    }
    query
}

/// Whether raw SQL produces result rows.
fn is_query(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    matches!(
        head.as_str(),
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" | "SHOW" | "FETCH" | "TABLE"
    ) || sql.to_uppercase().contains(" RETURNING ")
}

/// Assemble a statement for the implementor: resolve the table's cached
/// metadata, render SQL, and run every outbound parameter through the
/// adapter registry.
pub(crate) async fn build<Q>(
    queryable: &Q,
    op: Op,
    target: &Target,
    query: &Select,
    values: &Values,
) -> Result<Statement>
where
    Q: Queryable + ?Sized,
{
    let table = queryable.table_schema(target.table()).await?;
    let prefix = queryable.schema_prefix();
    let ctx = Context {
        dialect: queryable.engine().dialect(),
        schema_prefix: prefix.as_deref(),
        table: table.as_ref(),
    };
    let mut stmt = assemble(op, &ctx, target, query, values)?;
    stmt.params = stmt.params.into_iter().map(registry::adapt).collect();
    Ok(stmt)
}

/// Run every inbound cell through the converter for its declared type. The
/// declared type comes from the schema cache when the target table is known,
/// else from the driver-reported column type.
pub(crate) async fn convert_cursor<Q>(
    queryable: &Q,
    mut cursor: Cursor,
    target: Option<&Target>,
) -> Result<Cursor>
where
    Q: Queryable + ?Sized,
{
    let table = match target {
        Some(t) => queryable.table_schema(t.table()).await?,
        None => None,
    };
    let tags: Vec<(String, String)> = cursor
        .columns
        .iter()
        .map(|column| {
            let declared = table
                .as_ref()
                .and_then(|t| t.declared_type(&column.name))
                .map(str::to_string);
            (
                column.name.clone(),
                declared.unwrap_or_else(|| column.type_name.clone()),
            )
        })
        .collect();
    cursor.map_rows(|row| {
        let pairs = row
            .into_pairs()
            .into_iter()
            .map(|(name, value)| {
                let converted = match tags.iter().find(|(n, _)| *n == name) {
                    Some((_, tag)) => registry::convert(tag, value),
                    None => value,
                };
                (name, converted)
            })
            .collect();
        Row::from_pairs(pairs)
    });
    Ok(cursor)
}

/// Apply the instance row factory, else the process-wide one.
pub(crate) fn apply_row_factory<Q>(queryable: &Q, mut cursor: Cursor) -> Cursor
where
    Q: Queryable + ?Sized,
{
    if let Some(factory) = queryable
        .instance_row_factory()
        .or_else(registry::row_factory)
    {
        cursor.map_rows(|row| factory(row));
    }
    cursor
}

pub(crate) async fn do_insert<Q>(
    queryable: &Q,
    target: &Target,
    values: &Values,
) -> Result<Option<Value>>
where
    Q: Queryable + ?Sized,
{
    let stmt = build(queryable, Op::Insert, target, &Select::new(), values).await?;
    if queryable.engine().dialect().supports_returning {
        let mut cursor = queryable.raw_fetch(stmt).await?;
        Ok(cursor
            .fetchone()
            .and_then(|row| row.into_pairs().into_iter().next())
            .map(|(_, value)| value))
    } else {
        let cursor = queryable.raw_exec(stmt).await?;
        Ok(cursor.last_insert_id().cloned())
    }
}

/// Reject write and raw operations on a lazy transaction scope.
pub(crate) fn lazy_guard(lazy: bool) -> Result<()> {
    if lazy {
        return Err(Error::bad_argument(
            "a lazy transaction supports a single select query",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_query_classification() {
        assert!(is_query("SELECT 1"));
        assert!(is_query("  with x as (select 1) select * from x"));
        assert!(is_query("PRAGMA table_info(t)"));
        assert!(is_query("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!is_query("INSERT INTO t (a) VALUES (1)"));
        assert!(!is_query("UPDATE t SET a = 1"));
        assert!(!is_query("CREATE TABLE t (a)"));
    }

    #[test]
    fn test_limit_one_preserves_explicit_limit() {
        let unlimited = limit_one(Select::new());
        assert_eq!(unlimited.limit.count, Some(1));
        let limited = limit_one(Select::new().limit(5i64));
        assert_eq!(limited.limit.count, Some(5));
    }
}
