//! Engine type mappings.
//!
//! Type conversion uses a two-phase approach: `TypeCategory` classifies a
//! column's declared type into a logical category, and engine-specific
//! decoders extract the cell into a [`Value`] accordingly. Registered
//! converters run later, against the declared type tag, in the operation
//! pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

use crate::engine::Engine;
use crate::value::{Row, Value};

/// Result column metadata: name and declared type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    /// Driver-reported type name, e.g. "INTEGER", "jsonb".
    pub type_name: String,
}

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a type name into a logical category.
pub fn categorize_type(type_name: &str, engine: Engine) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity holds plain numbers.
        if engine == Engine::Sqlite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float") || lower.contains("double") || lower.contains("real") {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    if lower.contains("timestamp") || lower.contains("datetime") || lower == "date" || lower == "time" {
        return TypeCategory::Temporal;
    }
    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "clob" {
        return TypeCategory::Text;
    }
    TypeCategory::Unknown
}

/// Column metadata for an embedded result row.
pub(crate) fn sqlite_columns(row: &SqliteRow) -> Vec<ColumnMeta> {
    row.columns()
        .iter()
        .map(|c| ColumnMeta {
            name: c.name().to_string(),
            type_name: c.type_info().name().to_string(),
        })
        .collect()
}

/// Column metadata for a networked result row.
pub(crate) fn postgres_columns(row: &PgRow) -> Vec<ColumnMeta> {
    row.columns()
        .iter()
        .map(|c| ColumnMeta {
            name: c.name().to_string(),
            type_name: c.type_info().name().to_string(),
        })
        .collect()
}

/// Decode an embedded result row into values.
pub(crate) fn decode_sqlite_row(row: &SqliteRow) -> Row {
    let mut pairs = Vec::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = match categorize_type(column.type_info().name(), Engine::Sqlite) {
            TypeCategory::Integer => row
                .try_get::<Option<i64>, _>(i)
                .map(Value::from)
                .unwrap_or(Value::Null),
            TypeCategory::Float => row
                .try_get::<Option<f64>, _>(i)
                .map(Value::from)
                .or_else(|_| row.try_get::<Option<i64>, _>(i).map(Value::from))
                .unwrap_or(Value::Null),
            TypeCategory::Boolean => row
                .try_get::<Option<bool>, _>(i)
                .map(Value::from)
                .or_else(|_| row.try_get::<Option<i64>, _>(i).map(Value::from))
                .unwrap_or(Value::Null),
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(i)
                .map(Value::from)
                .unwrap_or(Value::Null),
            _ => decode_sqlite_fallback(row, i),
        };
        pairs.push((column.name().to_string(), value));
    }
    Row::from_pairs(pairs)
}

/// Texts, temporals and anything untyped: try the natural decodings in turn.
fn decode_sqlite_fallback(row: &SqliteRow, i: usize) -> Value {
    row.try_get::<Option<String>, _>(i)
        .map(Value::from)
        .or_else(|_| row.try_get::<Option<i64>, _>(i).map(Value::from))
        .or_else(|_| row.try_get::<Option<f64>, _>(i).map(Value::from))
        .or_else(|_| row.try_get::<Option<Vec<u8>>, _>(i).map(Value::from))
        .unwrap_or(Value::Null)
}

/// Decode a networked result row into values.
pub(crate) fn decode_postgres_row(row: &PgRow) -> Row {
    let mut pairs = Vec::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = match categorize_type(column.type_info().name(), Engine::Postgres) {
            TypeCategory::Integer => row
                .try_get::<Option<i64>, _>(i)
                .map(Value::from)
                .or_else(|_| {
                    row.try_get::<Option<i32>, _>(i)
                        .map(|v| Value::from(v.map(i64::from)))
                })
                .or_else(|_| {
                    row.try_get::<Option<i16>, _>(i)
                        .map(|v| Value::from(v.map(i64::from)))
                })
                .unwrap_or(Value::Null),
            TypeCategory::Float => row
                .try_get::<Option<f64>, _>(i)
                .map(Value::from)
                .or_else(|_| {
                    row.try_get::<Option<f32>, _>(i)
                        .map(|v| Value::from(v.map(f64::from)))
                })
                .unwrap_or(Value::Null),
            TypeCategory::Decimal => row
                .try_get::<Option<RawDecimal>, _>(i)
                .map(|v| match v {
                    Some(RawDecimal(s)) => Value::Text(s),
                    None => Value::Null,
                })
                .unwrap_or(Value::Null),
            TypeCategory::Boolean => row
                .try_get::<Option<bool>, _>(i)
                .map(Value::from)
                .unwrap_or(Value::Null),
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(i)
                .map(Value::from)
                .unwrap_or(Value::Null),
            TypeCategory::Json => row
                .try_get::<Option<JsonValue>, _>(i)
                .map(|v| v.map(Value::Json).unwrap_or(Value::Null))
                .unwrap_or(Value::Null),
            TypeCategory::Uuid => row
                .try_get::<Option<sqlx::types::Uuid>, _>(i)
                .map(|v| Value::from(v.map(|u| u.to_string())))
                .unwrap_or(Value::Null),
            TypeCategory::Temporal => decode_postgres_temporal(row, i),
            TypeCategory::Text | TypeCategory::Unknown => row
                .try_get::<Option<String>, _>(i)
                .map(Value::from)
                .unwrap_or(Value::Null),
        };
        pairs.push((column.name().to_string(), value));
    }
    Row::from_pairs(pairs)
}

/// Temporal values are carried as ISO-8601 text.
fn decode_postgres_temporal(row: &PgRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
        return Value::from(v.map(|dt| dt.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
        return Value::from(v.map(|dt| dt.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(i) {
        return Value::from(v.map(|d| d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(i) {
        return Value::from(v.map(|t| t.to_string()));
    }
    row.try_get::<Option<String>, _>(i)
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// Wrapper for raw DECIMAL/NUMERIC values as strings, preserving the exact
/// database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}
