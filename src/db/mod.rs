//! Database access layer.
//!
//! - Connection pool management
//! - Statement execution
//! - Schema introspection and caching
//! - Engine type mappings
//! - Database handles and transaction scopes

pub mod database;
pub mod executor;
pub(crate) mod params;
pub mod pool;
pub mod schema;
pub mod transaction;
pub mod types;

pub use database::Database;
pub use executor::Cursor;
pub use pool::DbPool;
pub use schema::{ColumnSchema, TableSchema};
pub use transaction::{Transaction, TransactionBuilder, DEFAULT_ITERSIZE};
pub use types::ColumnMeta;
