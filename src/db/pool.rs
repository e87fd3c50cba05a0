//! Connection pool management.
//!
//! Engine-specific sqlx pools behind one enum. The embedded engine is capped
//! at a single connection so all work shares the driver's one transaction
//! state; the networked engine uses the configured `[minconn, maxconn]`
//! bounds.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{PgPool, SqlitePool};
use tracing::info;

use crate::config::{ConnectOptions, PgOptions, SqliteOptions};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Engine-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl DbPool {
    /// Open a pool for the given connection options.
    pub async fn open(options: &ConnectOptions) -> Result<Self> {
        match options {
            ConnectOptions::Sqlite(opts) => Self::open_sqlite(opts).await,
            ConnectOptions::Postgres(opts) => Self::open_postgres(opts).await,
        }
    }

    async fn open_sqlite(opts: &SqliteOptions) -> Result<Self> {
        if !opts.is_memory() {
            if let Some(parent) = std::path::Path::new(&opts.path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::driver(format!("cannot create database directory: {e}"))
                    })?;
                }
            }
        }
        // One connection keeps the driver's single shared transaction state.
        // The connection must never be recycled: an in-memory database lives
        // and dies with it.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&opts.url())
            .await
            .map_err(Error::from)?;
        info!(path = %opts.path, "database opened");
        Ok(DbPool::Sqlite(pool))
    }

    async fn open_postgres(opts: &PgOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(opts.pool.min_connections)
            .max_connections(opts.pool.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(opts.pool.acquire_timeout_secs))
            .connect(&opts.url())
            .await
            .map_err(Error::from)?;
        info!(
            host = opts.host.as_deref().unwrap_or("localhost"),
            dbname = opts.dbname.as_deref().unwrap_or_default(),
            "database opened"
        );
        Ok(DbPool::Postgres(pool))
    }

    /// The engine this pool belongs to.
    pub fn engine(&self) -> Engine {
        match self {
            DbPool::Sqlite(_) => Engine::Sqlite,
            DbPool::Postgres(_) => Engine::Postgres,
        }
    }

    /// Close the pool, discarding all connections.
    pub async fn close(&self) {
        match self {
            DbPool::Sqlite(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
        }
        info!(engine = %self.engine(), "database closed");
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::Sqlite(pool) => pool.is_closed(),
            DbPool::Postgres(pool) => pool.is_closed(),
        }
    }
}
