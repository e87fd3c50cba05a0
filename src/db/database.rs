//! The Database type.
//!
//! A `Database` owns an engine-specific connection pool, a lazily-populated
//! schema metadata cache, an optional row factory, and the lock serializing
//! exclusive transaction scopes on the embedded engine. Operations directly
//! on the database run in driver autocommit mode. Opened instances register
//! in a process-wide default-instance cache keyed by engine and connection
//! identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex as StdMutex, RwLock as StdRwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::ConnectOptions;
use crate::db::executor::{
    exec_postgres, exec_sqlite, fetch_postgres, fetch_sqlite, script_postgres, script_sqlite,
    Cursor,
};
use crate::db::pool::DbPool;
use crate::db::schema::{self, resolve_table, SchemaMap, TableSchema};
use crate::db::transaction::TransactionBuilder;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::queryable::Queryable;
use crate::registry::RowFactory;
use crate::sql::Statement;
use crate::value::Row;

/// Opened database instances, in creation order. The first entry is the
/// process default.
static INSTANCES: LazyLock<StdMutex<Vec<((Engine, String), Database)>>> =
    LazyLock::new(|| StdMutex::new(Vec::new()));

pub(crate) struct DatabaseInner {
    options: ConnectOptions,
    pool: DbPool,
    closed: AtomicBool,
    /// Serializes exclusive transaction scopes.
    tx_lock: Arc<Mutex<()>>,
    schema_cache: RwLock<Option<SchemaMap>>,
    row_factory: StdRwLock<Option<RowFactory>>,
}

/// A database handle. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Open a database from a textual connection descriptor, returning the
    /// cached instance when one was already opened with the same options.
    pub async fn open(descriptor: &str) -> Result<Self> {
        Self::open_with(ConnectOptions::parse(descriptor)?).await
    }

    /// Open a database from parsed connection options.
    pub async fn open_with(options: impl Into<ConnectOptions>) -> Result<Self> {
        let options = options.into();
        let key = (options.engine(), options.identity());
        if let Some(existing) = lookup_instance(&key) {
            return Ok(existing);
        }

        let pool = DbPool::open(&options).await?;
        let db = Database {
            inner: Arc::new(DatabaseInner {
                options,
                pool,
                closed: AtomicBool::new(false),
                tx_lock: Arc::new(Mutex::new(())),
                schema_cache: RwLock::new(None),
                row_factory: StdRwLock::new(None),
            }),
        };

        let raced = {
            let mut cache = INSTANCES.lock().unwrap_or_else(|e| e.into_inner());
            let existing = cache
                .iter()
                .find(|(k, db)| *k == key && !db.closed())
                .map(|(_, db)| db.clone());
            if existing.is_none() {
                cache.push((key, db.clone()));
            }
            existing
        };
        if let Some(existing) = raced {
            db.inner.pool.close().await;
            return Ok(existing);
        }
        Ok(db)
    }

    /// The first database instance ever opened in this process.
    pub fn default_instance() -> Result<Self> {
        let cache = INSTANCES.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .first()
            .map(|(_, db)| db.clone())
            .ok_or_else(|| Error::bad_argument("no database initialized"))
    }

    /// The first database instance opened for the given engine.
    pub fn default_for(engine: Engine) -> Result<Self> {
        let cache = INSTANCES.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .find(|((e, _), _)| *e == engine)
            .map(|(_, db)| db.clone())
            .ok_or_else(|| {
                Error::bad_argument(format!("no {engine} database initialized"))
            })
    }

    /// Whether the database has been closed.
    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.pool.is_closed()
    }

    /// Close the database, discarding all pooled connections and dropping
    /// the instance from the default-instance cache.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut cache = INSTANCES.lock().unwrap_or_else(|e| e.into_inner());
            cache.retain(|(_, db)| !Arc::ptr_eq(&db.inner, &self.inner));
        }
        self.inner.pool.close().await;
        info!(engine = %self.engine(), "database instance closed");
    }

    /// The connection options this database was opened with.
    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    /// Whether two handles refer to the same database instance.
    pub fn is(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Set or clear this database's row factory.
    pub fn set_row_factory(&self, factory: Option<impl Fn(Row) -> Row + Send + Sync + 'static>) {
        let mut slot = self
            .inner
            .row_factory
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = factory.map(|f| Arc::new(f) as RowFactory);
    }

    /// Start building a transaction scope on this database.
    pub fn transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.clone())
    }

    /// Run `f` inside a transaction scope with default options: commit on
    /// success, rollback and suppress on [`Error::Rollback`] (returning
    /// `None`), rollback and propagate any other error.
    pub async fn run_in_transaction<T, F>(&self, f: F) -> Result<Option<T>>
    where
        T: Send,
        F: for<'a> FnOnce(
                &'a crate::Transaction,
            ) -> futures_util::future::BoxFuture<'a, Result<T>>
            + Send,
    {
        self.transaction().run(f).await
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.inner.pool
    }

    pub(crate) fn tx_lock(&self) -> Arc<Mutex<()>> {
        self.inner.tx_lock.clone()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed() {
            return Err(Error::NotOpen);
        }
        Ok(())
    }

    /// Drop the schema metadata cache; the next reference reloads it.
    pub(crate) async fn invalidate_schema(&self) {
        *self.inner.schema_cache.write().await = None;
    }

    /// Store an externally loaded schema snapshot.
    pub(crate) async fn store_schema(&self, map: SchemaMap) {
        *self.inner.schema_cache.write().await = Some(map);
    }

    /// Resolve a table against the cache without loading it.
    pub(crate) async fn cached_table_schema(&self, table: &str) -> Option<Option<TableSchema>> {
        let cache = self.inner.schema_cache.read().await;
        cache
            .as_ref()
            .map(|map| resolve_table(map, table).cloned())
    }

    /// Load the schema snapshot over a pool connection.
    pub(crate) async fn load_schema(&self) -> Result<SchemaMap> {
        match &self.inner.pool {
            DbPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await.map_err(Error::from)?;
                schema::load_sqlite(&mut conn).await
            }
            DbPool::Postgres(pool) => {
                let mut conn = pool.acquire().await.map_err(Error::from)?;
                schema::load_postgres(&mut conn).await
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine())
            .field("closed", &self.closed())
            .finish()
    }
}

#[async_trait]
impl Queryable for Database {
    fn engine(&self) -> Engine {
        self.inner.pool.engine()
    }

    fn instance_row_factory(&self) -> Option<RowFactory> {
        self.inner
            .row_factory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn table_schema(&self, table: &str) -> Result<Option<TableSchema>> {
        self.ensure_open()?;
        if let Some(resolved) = self.cached_table_schema(table).await {
            return Ok(resolved);
        }
        let map = self.load_schema().await?;
        let resolved = resolve_table(&map, table).cloned();
        self.store_schema(map).await;
        Ok(resolved)
    }

    // Database operations run outside any transaction scope, so a stray
    // rollback sentinel surfacing here is reclassified as a driver failure.

    async fn raw_fetch(&self, stmt: Statement) -> Result<Cursor> {
        self.ensure_open()?;
        let result = match &self.inner.pool {
            DbPool::Sqlite(pool) => fetch_sqlite(pool, &stmt).await,
            DbPool::Postgres(pool) => fetch_postgres(pool, &stmt).await,
        };
        result.map_err(Error::reclassify_stray_rollback)
    }

    async fn raw_exec(&self, stmt: Statement) -> Result<Cursor> {
        self.ensure_open()?;
        let result = match &self.inner.pool {
            DbPool::Sqlite(pool) => exec_sqlite(pool, &stmt).await,
            DbPool::Postgres(pool) => exec_postgres(pool, &stmt).await,
        };
        result.map_err(Error::reclassify_stray_rollback)
    }

    async fn raw_script(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        let result = match &self.inner.pool {
            DbPool::Sqlite(pool) => script_sqlite(pool, sql).await,
            DbPool::Postgres(pool) => script_postgres(pool, sql).await,
        };
        result.map_err(Error::reclassify_stray_rollback)?;
        self.invalidate_schema().await;
        Ok(())
    }
}

fn lookup_instance(key: &(Engine, String)) -> Option<Database> {
    let cache = INSTANCES.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .iter()
        .find(|(k, db)| k == key && !db.closed())
        .map(|(_, db)| db.clone())
}
