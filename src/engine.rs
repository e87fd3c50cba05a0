//! Supported database engines.

use crate::sql::dialect::{Dialect, POSTGRES, SQLITE};

/// A backend engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// Embedded file or in-memory engine (SQLite).
    Sqlite,
    /// Networked client-server engine (PostgreSQL).
    Postgres,
}

impl Engine {
    /// All registered engines, in registration order.
    pub const ALL: [Engine; 2] = [Engine::Sqlite, Engine::Postgres];

    /// Look up an engine by its short name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// The engine's short name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// The engine's SQL dialect descriptor.
    pub fn dialect(&self) -> &'static Dialect {
        match self {
            Self::Sqlite => &SQLITE,
            Self::Postgres => &POSTGRES,
        }
    }

    /// Detect the engine from a textual connection descriptor.
    ///
    /// `postgres://`, `postgresql://` URIs and `k=v` conninfo strings are
    /// networked; paths, `:memory:`, `file:` and `sqlite:` URIs are embedded.
    pub fn autodetect(descriptor: &str) -> Option<Self> {
        let lower = descriptor.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            return Some(Self::Postgres);
        }
        if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            return Some(Self::Sqlite);
        }
        if descriptor == ":memory:" || lower.starts_with("file:") {
            return Some(Self::Sqlite);
        }
        // "host=localhost dbname=mydb" conninfo form.
        if descriptor
            .split_whitespace()
            .all(|part| part.contains('='))
            && descriptor.contains('=')
        {
            return Some(Self::Postgres);
        }
        // Any other scheme-less string is treated as a filesystem path.
        if !descriptor.contains("://") {
            return Some(Self::Sqlite);
        }
        None
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
