//! dbkit — a uniform parameterized query facade over SQLite and PostgreSQL.
//!
//! Callers phrase SELECT / INSERT / UPDATE / DELETE through structured
//! argument types; dbkit renders backend-correct SQL with positional
//! placeholders, binds parameters, and returns ordered-map rows or
//! user-defined record types.
//!
//! ```no_run
//! use dbkit::{Database, Queryable, Select, Where};
//!
//! # async fn demo() -> dbkit::Result<()> {
//! let db = Database::open(":memory:").await?;
//! db.executescript("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
//!     .await?;
//! db.insert("t", [("val", "a")]).await?;
//! let rows = db
//!     .fetchall("t", Select::new().filter(Where::new().eq("val", "a")).order("id"))
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod bind;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod registry;
pub mod sql;
pub mod util;
pub mod value;

mod queryable;

pub use bind::Record;
pub use config::{ConnectOptions, PgOptions, PoolOptions, SqliteOptions};
pub use db::{ColumnMeta, Cursor, Database, TableSchema, Transaction, TransactionBuilder};
pub use engine::Engine;
pub use error::{Error, Result};
pub use queryable::Queryable;
pub use registry::{register_adapter, register_converter, register_row_factory};
pub use sql::args::{Col, Columns, Limit, Order, Select, Target, Values, Where};
pub use value::{Params, Row, Value};

/// Open a database from a connection descriptor, returning the cached
/// instance when one was already opened with the same options. The first
/// database opened in the process becomes the default instance.
pub async fn init(descriptor: &str) -> Result<Database> {
    Database::open(descriptor).await
}

/// The default database: the first instance opened in this process.
pub fn default_db() -> Result<Database> {
    Database::default_instance()
}

/// The first database instance opened for the given engine.
pub fn default_for(engine: Engine) -> Result<Database> {
    Database::default_for(engine)
}
