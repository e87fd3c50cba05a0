//! Schema introspection.
//!
//! Populates the per-database schema metadata cache: for every table, the
//! column names as declared, their declared types, and the primary key
//! column. The networked engine reads the information schema; the embedded
//! engine reads the catalog table and table pragmas.

use std::collections::HashMap;

use sqlx::{PgConnection, Row as _, SqliteConnection};
use tracing::debug;

use crate::error::Result;

/// Declared metadata for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Column name as declared, original casing preserved.
    pub name: String,
    /// Declared type name, lowercased.
    pub decl_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, decl_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl_type: decl_type.into().to_lowercase(),
        }
    }
}

/// Declared metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Table name as declared.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSchema>,
    /// Primary key column, if the table declares one.
    pub primary_key: Option<String>,
}

impl TableSchema {
    /// The declared type of a column, matched case-insensitively.
    pub fn declared_type(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| c.decl_type.as_str())
    }
}

/// A loaded schema snapshot, keyed by table name as declared.
pub type SchemaMap = HashMap<String, TableSchema>;

/// Resolve a table reference against the snapshot: exact name first, then a
/// unique case-insensitive match.
pub fn resolve_table<'a>(schema: &'a SchemaMap, name: &str) -> Option<&'a TableSchema> {
    if let Some(table) = schema.get(name) {
        return Some(table);
    }
    let mut matches = schema
        .values()
        .filter(|table| table.name.eq_ignore_ascii_case(name));
    match (matches.next(), matches.next()) {
        (Some(table), None) => Some(table),
        _ => None,
    }
}

mod queries {
    pub mod postgres {
        pub const LIST_COLUMNS: &str = r#"
            SELECT table_name, column_name, data_type
            FROM information_schema.columns
            WHERE table_schema = 'public'
            ORDER BY table_name, ordinal_position
            "#;

        pub const LIST_PRIMARY_KEYS: &str = r#"
            SELECT tc.table_name, kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = 'public'
              AND tc.constraint_type = 'PRIMARY KEY'
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

/// Load the schema snapshot from a networked database.
pub(crate) async fn load_postgres(conn: &mut PgConnection) -> Result<SchemaMap> {
    let mut schema = SchemaMap::new();

    let columns = sqlx::query(queries::postgres::LIST_COLUMNS)
        .fetch_all(&mut *conn)
        .await?;
    for row in &columns {
        let table: String = row.try_get("table_name")?;
        let column: String = row.try_get("column_name")?;
        let decl_type: String = row.try_get("data_type")?;
        schema
            .entry(table.clone())
            .or_insert_with(|| TableSchema {
                name: table,
                columns: Vec::new(),
                primary_key: None,
            })
            .columns
            .push(ColumnSchema::new(column, decl_type));
    }

    let keys = sqlx::query(queries::postgres::LIST_PRIMARY_KEYS)
        .fetch_all(&mut *conn)
        .await?;
    let mut key_columns: HashMap<String, Vec<String>> = HashMap::new();
    for row in &keys {
        let table: String = row.try_get("table_name")?;
        let column: String = row.try_get("column_name")?;
        key_columns.entry(table).or_default().push(column);
    }
    for (table, columns) in key_columns {
        // Composite keys are not usable as a single returned id.
        if let (Some(entry), [column]) = (schema.get_mut(&table), columns.as_slice()) {
            entry.primary_key = Some(column.clone());
        }
    }

    debug!(tables = schema.len(), "schema cache loaded");
    Ok(schema)
}

/// Load the schema snapshot from an embedded database.
pub(crate) async fn load_sqlite(conn: &mut SqliteConnection) -> Result<SchemaMap> {
    let mut schema = SchemaMap::new();

    let tables = sqlx::query(queries::sqlite::LIST_TABLES)
        .fetch_all(&mut *conn)
        .await?;
    for row in &tables {
        let table: String = row.try_get("name")?;
        let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let columns = sqlx::query(&pragma).fetch_all(&mut *conn).await?;
        let mut entry = TableSchema {
            name: table.clone(),
            columns: Vec::new(),
            primary_key: None,
        };
        let mut key_columns = Vec::new();
        for column in &columns {
            let name: String = column.try_get("name")?;
            let decl_type: String = column.try_get("type")?;
            let pk: i64 = column.try_get("pk")?;
            if pk > 0 {
                key_columns.push(name.clone());
            }
            entry.columns.push(ColumnSchema::new(name, decl_type));
        }
        // Composite keys are not usable as a single returned id.
        if let [column] = key_columns.as_slice() {
            entry.primary_key = Some(column.clone());
        }
        schema.insert(table, entry);
    }

    debug!(tables = schema.len(), "schema cache loaded");
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SchemaMap {
        let mut map = SchemaMap::new();
        map.insert(
            "Devices".to_string(),
            TableSchema {
                name: "Devices".to_string(),
                columns: vec![
                    ColumnSchema::new("Id", "BIGINT"),
                    ColumnSchema::new("Name", "text"),
                ],
                primary_key: Some("Id".to_string()),
            },
        );
        map.insert(
            "events".to_string(),
            TableSchema {
                name: "events".to_string(),
                columns: vec![ColumnSchema::new("at", "timestamp")],
                primary_key: None,
            },
        );
        map
    }

    #[test]
    fn test_resolve_table_exact_and_case_insensitive() {
        let schema = snapshot();
        assert!(resolve_table(&schema, "events").is_some());
        let resolved = resolve_table(&schema, "devices").unwrap();
        assert_eq!(resolved.name, "Devices");
        assert!(resolve_table(&schema, "missing").is_none());
    }

    #[test]
    fn test_declared_type_lookup_lowercases() {
        let schema = snapshot();
        let table = resolve_table(&schema, "Devices").unwrap();
        assert_eq!(table.declared_type("id"), Some("bigint"));
        assert_eq!(table.declared_type("Name"), Some("text"));
        assert_eq!(table.declared_type("missing"), None);
    }
}
