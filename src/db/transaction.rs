//! Transaction scopes.
//!
//! A `Transaction` holds one driver transaction on a dedicated connection for
//! the duration of the scope. `commit` and `rollback` complete the current
//! driver transaction and immediately begin another, so a scope stays usable
//! until `close`. Embedded scopes are mutually exclusive by default, behind a
//! fair lock on the owning database. Networked scopes may run in lazy mode:
//! a named server-side cursor streams the results of a single select in
//! batches.

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::database::Database;
use crate::db::executor::{
    exec_postgres, exec_sqlite, fetch_postgres, fetch_sqlite, script_postgres_conn,
    script_sqlite_conn, Cursor,
};
use crate::db::pool::DbPool;
use crate::db::schema::{self, resolve_table, TableSchema};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::queryable::{
    apply_row_factory, build, convert_cursor, lazy_guard, limit_one, Queryable,
};
use crate::registry::RowFactory;
use crate::sql::args::{Select, Target, Values};
use crate::sql::{Op, Statement};
use crate::value::Row;

/// Default row batch size for lazy-mode fetches.
pub const DEFAULT_ITERSIZE: u32 = 2000;

/// Builder for a transaction scope.
#[derive(Debug)]
pub struct TransactionBuilder {
    db: Database,
    commit: bool,
    exclusive: Option<bool>,
    schema: Option<String>,
    lazy: bool,
    itersize: u32,
}

impl TransactionBuilder {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            commit: true,
            exclusive: None,
            schema: None,
            lazy: false,
            itersize: DEFAULT_ITERSIZE,
        }
    }

    /// Whether the scope commits on close. Default: true.
    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    /// Whether the scope excludes other scopes on the same database.
    /// Defaults to the engine's discipline: exclusive on the embedded
    /// engine, concurrent on the networked engine.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = Some(exclusive);
        self
    }

    /// Prefix unqualified table names with the given schema for the scope.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Use a server-side cursor streaming a single select in batches.
    /// Networked engine only.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Batch size for lazy-mode fetches. Default: 2000 rows.
    pub fn itersize(mut self, itersize: u32) -> Self {
        self.itersize = itersize.max(1);
        self
    }

    /// Enter the scope: acquire the exclusivity lock if applicable and begin
    /// a driver transaction on a dedicated connection.
    pub async fn begin(self) -> Result<Transaction> {
        self.db.ensure_open()?;
        let engine = self.db.pool().engine();
        if self.lazy && engine != Engine::Postgres {
            return Err(Error::bad_argument(
                "lazy transactions require the networked engine",
            ));
        }
        let exclusive = self.exclusive.unwrap_or(engine == Engine::Sqlite);
        let guard = if exclusive {
            Some(self.db.tx_lock().lock_owned().await)
        } else {
            None
        };
        let tx = begin_driver(&self.db).await?;
        debug!(engine = %engine, exclusive, lazy = self.lazy, "transaction started");
        Ok(Transaction {
            db: self.db,
            commit_on_close: self.commit,
            schema: self.schema,
            lazy: self.lazy,
            itersize: self.itersize,
            state: Mutex::new(TxState {
                tx: Some(tx),
                guard,
                lazy_cursor: None,
                closed: false,
            }),
        })
    }

    /// Enter the scope, run `f`, and exit with the scope discipline: commit
    /// when configured and `f` succeeded, rollback and return `None` on
    /// [`Error::Rollback`], rollback and propagate any other error.
    pub async fn run<T, F>(self, f: F) -> Result<Option<T>>
    where
        T: Send,
        F: for<'a> FnOnce(&'a Transaction) -> futures_util::future::BoxFuture<'a, Result<T>>
            + Send,
    {
        let commit_on_success = self.commit;
        let tx = self.begin().await?;
        match f(&tx).await {
            Ok(value) => {
                tx.close(Some(commit_on_success)).await?;
                Ok(Some(value))
            }
            Err(Error::Rollback) => {
                tx.close(Some(false)).await?;
                Ok(None)
            }
            Err(error) => {
                warn!(error = %error, "transaction failed, rolling back");
                if let Err(close_error) = tx.close(Some(false)).await {
                    warn!(error = %close_error, "rollback on failure also failed");
                }
                Err(error)
            }
        }
    }
}

/// Engine-specific driver transaction.
enum DbTransaction {
    Sqlite(sqlx::Transaction<'static, sqlx::Sqlite>),
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
}

impl DbTransaction {
    async fn commit(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.commit().await.map_err(Error::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(Error::from),
        }
    }

    async fn rollback(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.rollback().await.map_err(Error::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(Error::from),
        }
    }
}

async fn begin_driver(db: &Database) -> Result<DbTransaction> {
    match db.pool() {
        DbPool::Sqlite(pool) => Ok(DbTransaction::Sqlite(
            pool.begin().await.map_err(Error::from)?,
        )),
        DbPool::Postgres(pool) => Ok(DbTransaction::Postgres(
            pool.begin().await.map_err(Error::from)?,
        )),
    }
}

struct TxState {
    tx: Option<DbTransaction>,
    /// Held for the scope's duration when the scope is exclusive.
    guard: Option<OwnedMutexGuard<()>>,
    /// Name of the declared server-side cursor, lazy mode only.
    lazy_cursor: Option<String>,
    closed: bool,
}

/// A transaction scope. Single-threaded by contract: operations serialize on
/// an internal lock, and the scope must be closed (or dropped, which rolls
/// back) by the task that owns it.
pub struct Transaction {
    db: Database,
    commit_on_close: bool,
    schema: Option<String>,
    lazy: bool,
    itersize: u32,
    state: Mutex<TxState>,
}

impl Transaction {
    /// The owning database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Whether the scope has been closed.
    pub async fn closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Commit the current driver transaction and begin another; the scope
    /// stays open.
    pub async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::NotOpen);
        }
        if let Some(tx) = state.tx.take() {
            tx.commit().await?;
        }
        state.lazy_cursor = None;
        state.tx = Some(begin_driver(&self.db).await?);
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the current driver transaction and begin another; the scope
    /// stays open.
    pub async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::NotOpen);
        }
        if let Some(tx) = state.tx.take() {
            tx.rollback().await?;
        }
        state.lazy_cursor = None;
        state.tx = Some(begin_driver(&self.db).await?);
        debug!("transaction rolled back");
        Ok(())
    }

    /// Exit the scope. `commit` overrides the configured close behavior:
    /// `Some(true)` commits, `Some(false)` rolls back, `None` follows the
    /// builder's `commit` flag. Closing an already closed scope is a no-op.
    pub async fn close(&self, commit: Option<bool>) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.lazy_cursor = None;
        let result = match state.tx.take() {
            Some(tx) => {
                if commit.unwrap_or(self.commit_on_close) {
                    tx.commit().await
                } else {
                    tx.rollback().await
                }
            }
            None => Ok(()),
        };
        state.guard = None;
        debug!("transaction closed");
        result
    }

    /// Fetch the next batch of rows from a lazy scope's server-side cursor.
    /// An empty batch means the cursor is exhausted.
    pub async fn fetch_batch(&self) -> Result<Vec<Row>> {
        self.fetch_forward(self.itersize).await
    }

    async fn fetch_forward(&self, n: u32) -> Result<Vec<Row>> {
        let cursor = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(Error::NotOpen);
            }
            let name = state
                .lazy_cursor
                .clone()
                .ok_or_else(|| Error::bad_argument("no query issued on lazy transaction"))?;
            let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
            let stmt = Statement {
                sql: format!("FETCH FORWARD {n} FROM \"{name}\""),
                params: Vec::new(),
            };
            match tx {
                DbTransaction::Postgres(tx) => fetch_postgres(&mut **tx, &stmt).await?,
                DbTransaction::Sqlite(_) => {
                    return Err(Error::bad_argument(
                        "lazy transactions require the networked engine",
                    ))
                }
            }
        };
        let cursor = convert_cursor(self, cursor, None).await?;
        let mut cursor = apply_row_factory(self, cursor);
        Ok(cursor.fetchall())
    }

    /// Declare the lazy scope's server-side cursor for the assembled select.
    async fn declare(&self, target: &Target, query: &Select) -> Result<()> {
        let mut stmt = build(self, Op::Select, target, query, &Values::new()).await?;
        let name = format!("cur_{}", Uuid::new_v4().simple());
        stmt.sql = format!("DECLARE \"{name}\" NO SCROLL CURSOR FOR {}", stmt.sql);

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::NotOpen);
        }
        if state.lazy_cursor.is_some() {
            return Err(Error::bad_argument(
                "a lazy transaction supports a single select query",
            ));
        }
        let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
        match tx {
            DbTransaction::Postgres(tx) => {
                exec_postgres(&mut **tx, &stmt).await?;
            }
            DbTransaction::Sqlite(_) => {
                return Err(Error::bad_argument(
                    "lazy transactions require the networked engine",
                ))
            }
        }
        state.lazy_cursor = Some(name);
        Ok(())
    }

    /// Run a fetch on the scope's connection.
    async fn tx_fetch(&self, stmt: Statement) -> Result<Cursor> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::NotOpen);
        }
        let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
        match tx {
            DbTransaction::Sqlite(tx) => fetch_sqlite(&mut **tx, &stmt).await,
            DbTransaction::Postgres(tx) => fetch_postgres(&mut **tx, &stmt).await,
        }
    }

    /// Run a write on the scope's connection.
    async fn tx_exec(&self, stmt: Statement) -> Result<Cursor> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::NotOpen);
        }
        let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
        match tx {
            DbTransaction::Sqlite(tx) => exec_sqlite(&mut **tx, &stmt).await,
            DbTransaction::Postgres(tx) => exec_postgres(&mut **tx, &stmt).await,
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("engine", &self.db.pool().engine())
            .field("commit_on_close", &self.commit_on_close)
            .field("lazy", &self.lazy)
            .finish()
    }
}

#[async_trait]
impl Queryable for Transaction {
    fn engine(&self) -> Engine {
        self.db.pool().engine()
    }

    fn schema_prefix(&self) -> Option<String> {
        self.schema.clone()
    }

    fn instance_row_factory(&self) -> Option<RowFactory> {
        self.db.instance_row_factory()
    }

    async fn table_schema(&self, table: &str) -> Result<Option<TableSchema>> {
        self.db.ensure_open()?;
        if let Some(resolved) = self.db.cached_table_schema(table).await {
            return Ok(resolved);
        }
        // Load over the scope's own connection; on the embedded engine the
        // pool's only connection is held by this scope.
        let map = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(Error::NotOpen);
            }
            let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
            match tx {
                DbTransaction::Sqlite(tx) => schema::load_sqlite(&mut **tx).await?,
                DbTransaction::Postgres(tx) => schema::load_postgres(&mut **tx).await?,
            }
        };
        let resolved = resolve_table(&map, table).cloned();
        self.db.store_schema(map).await;
        Ok(resolved)
    }

    async fn raw_fetch(&self, stmt: Statement) -> Result<Cursor> {
        lazy_guard(self.lazy)?;
        self.tx_fetch(stmt).await
    }

    async fn raw_exec(&self, stmt: Statement) -> Result<Cursor> {
        lazy_guard(self.lazy)?;
        self.tx_exec(stmt).await
    }

    async fn raw_script(&self, sql: &str) -> Result<()> {
        lazy_guard(self.lazy)?;
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(Error::NotOpen);
            }
            let tx = state.tx.as_mut().ok_or(Error::NotOpen)?;
            match tx {
                DbTransaction::Sqlite(tx) => {
                    script_sqlite_conn(&mut **tx, sql).await?;
                }
                DbTransaction::Postgres(tx) => {
                    script_postgres_conn(&mut **tx, sql).await?;
                }
            }
        }
        self.db.invalidate_schema().await;
        Ok(())
    }

    async fn select<T>(&self, target: T, query: Select) -> Result<Cursor>
    where
        T: Into<Target> + Send,
    {
        let target = target.into();
        if self.lazy {
            self.declare(&target, &query).await?;
            return Ok(Cursor::default());
        }
        let stmt = build(self, Op::Select, &target, &query, &Values::new()).await?;
        let cursor = self.tx_fetch(stmt).await?;
        let cursor = convert_cursor(self, cursor, Some(&target)).await?;
        Ok(apply_row_factory(self, cursor))
    }

    async fn fetchall<T>(&self, target: T, query: Select) -> Result<Vec<Row>>
    where
        T: Into<Target> + Send,
    {
        let mut cursor = self.select(target, query).await?;
        if !self.lazy {
            return Ok(cursor.fetchall());
        }
        let mut rows = Vec::new();
        loop {
            let batch = self.fetch_batch().await?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }
        Ok(rows)
    }

    async fn fetchone<T>(&self, target: T, query: Select) -> Result<Option<Row>>
    where
        T: Into<Target> + Send,
    {
        if self.lazy {
            self.select(target, query).await?;
            let batch = self.fetch_forward(1).await?;
            return Ok(batch.into_iter().next());
        }
        let mut cursor = self.select(target, limit_one(query)).await?;
        Ok(cursor.fetchone())
    }
}
