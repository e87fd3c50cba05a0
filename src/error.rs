//! Error types for dbkit.
//!
//! This module defines the closed error taxonomy using `thiserror`. Driver
//! failures carry the originating SQL text and rendered parameter list for
//! diagnostics.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Structural violation detected before any I/O: empty VALUES, unknown
    /// ORDER direction, unresolvable columns, second query on a lazy scope.
    #[error("invalid argument: {0}")]
    BadArgument(String),

    /// Operation on a closed Database or Transaction.
    #[error("database or transaction is closed")]
    NotOpen,

    /// Error returned by the driver, with originating statement attached.
    #[error("query failed: {message}")]
    Driver {
        message: String,
        /// e.g. "23505" for a Postgres unique violation
        code: Option<String>,
        sql: Option<String>,
        params: Option<String>,
    },

    /// Constraint violation (UNIQUE, FOREIGN KEY, NOT NULL, CHECK).
    #[error("constraint violation: {message}")]
    Integrity {
        message: String,
        code: Option<String>,
        sql: Option<String>,
        params: Option<String>,
    },

    /// Sentinel signal from caller code. Honored by
    /// [`Database::run_in_transaction`](crate::Database::run_in_transaction),
    /// which rolls the scope back and suppresses it. Surfacing through a
    /// database-level operation outside any transaction scope, the sentinel
    /// is reclassified as a [`Driver`](Error::Driver) failure.
    #[error("transaction rolled back")]
    Rollback,
}

impl Error {
    /// Create a `BadArgument` error.
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument(message.into())
    }

    /// Create a `Driver` error without statement context.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
            code: None,
            sql: None,
            params: None,
        }
    }

    /// Check whether this error is a constraint violation.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// The driver-reported error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Driver { code, .. } | Self::Integrity { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The SQL statement that produced this error, if known.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Driver { sql, .. } | Self::Integrity { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// Reclassify a stray sentinel: `Rollback` surfacing outside a
    /// transaction scope is reported as a driver failure.
    pub(crate) fn reclassify_stray_rollback(self) -> Self {
        match self {
            Self::Rollback => Self::Driver {
                message: "rollback signal raised outside a transaction scope".to_string(),
                code: None,
                sql: None,
                params: None,
            },
            other => other,
        }
    }

    /// Attach statement context to a driver or integrity error.
    pub(crate) fn with_statement(self, sql: &str, params: &[crate::Value]) -> Self {
        let rendered = format!("{params:?}");
        match self {
            Self::Driver { message, code, .. } => Self::Driver {
                message,
                code,
                sql: Some(sql.to_string()),
                params: Some(rendered),
            },
            Self::Integrity { message, code, .. } => Self::Integrity {
                message,
                code,
                sql: Some(sql.to_string()),
                params: Some(rendered),
            },
            other => other,
        }
    }
}

/// Convert sqlx errors, classifying constraint violations as `Integrity`.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                use sqlx::error::ErrorKind;
                match db_err.kind() {
                    ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => Error::Integrity {
                        message,
                        code,
                        sql: None,
                        params: None,
                    },
                    _ => Error::Driver {
                        message,
                        code,
                        sql: None,
                        params: None,
                    },
                }
            }
            sqlx::Error::PoolClosed => Error::NotOpen,
            sqlx::Error::RowNotFound => Error::driver("no rows returned"),
            other => Error::driver(other.to_string()),
        }
    }
}

/// Result type alias for dbkit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_error_display() {
        let err = Error::bad_argument("VALUES must not be empty");
        assert!(err.to_string().contains("invalid argument"));
        assert!(Error::NotOpen.to_string().contains("closed"));
    }

    #[test]
    fn test_statement_context_attached() {
        let err = Error::driver("syntax error")
            .with_statement("SELECT * FROM t WHERE id = ?", &[Value::Int(1)]);
        assert_eq!(err.sql(), Some("SELECT * FROM t WHERE id = ?"));
    }

    #[test]
    fn test_integrity_flag() {
        let err = Error::Integrity {
            message: "UNIQUE constraint failed".into(),
            code: Some("2067".into()),
            sql: None,
            params: None,
        };
        assert!(err.is_integrity());
        assert!(!Error::Rollback.is_integrity());
    }

    #[test]
    fn test_rollback_is_not_contextualized() {
        let err = Error::Rollback.with_statement("DELETE FROM t", &[]);
        assert!(matches!(err, Error::Rollback));
    }

    #[test]
    fn test_stray_rollback_reclassified_as_driver_failure() {
        let err = Error::Rollback.reclassify_stray_rollback();
        assert!(matches!(err, Error::Driver { .. }));
        assert!(err.to_string().contains("query failed"));
        // Every other kind passes through untouched.
        let err = Error::NotOpen.reclassify_stray_rollback();
        assert!(matches!(err, Error::NotOpen));
    }
}
