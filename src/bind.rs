//! Object-to-table binding.
//!
//! A user-defined record type stands in for a table by implementing
//! [`Record`]: the type names its table, its ordered column set, and
//! optionally its primary key. Field values are extracted through serde (in
//! declaration order), and result rows materialize back into instances the
//! same way. Record-derived names are auto-quoted and casing-resolved by the
//! assembler.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::registry;
use crate::sql::args::{Col, Columns, TableBinding, Target, Values};
use crate::value::{Row, Value};

/// A record type bound to a table.
///
/// ```
/// use dbkit::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Device {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Record for Device {
///     fn table() -> &'static str {
///         "devices"
///     }
///     fn columns() -> &'static [&'static str] {
///         &["id", "name"]
///     }
///     fn primary_key() -> Option<&'static str> {
///         Some("id")
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned {
    /// The table name this type is bound to.
    fn table() -> &'static str;

    /// The ordered column set, matching the field declaration order.
    fn columns() -> &'static [&'static str];

    /// The primary key column, if the table has one.
    fn primary_key() -> Option<&'static str> {
        None
    }
}

/// The query target for a record type.
pub fn target_of<R: Record>() -> Target {
    Target::Bound(TableBinding {
        table: R::table(),
        columns: R::columns(),
        primary_key: R::primary_key(),
    })
}

/// The record type's columns as a record-derived column list.
pub fn columns_of<R: Record>() -> Columns {
    Columns::from(
        R::columns()
            .iter()
            .map(|name| Col::bound(*name))
            .collect::<Vec<_>>(),
    )
}

/// Extract (column, value) pairs from a record instance, in column order.
/// `None` fields are preserved as null values; each value passes through the
/// adapter registry.
pub fn values_of<R: Record>(record: &R) -> Result<Values> {
    let json = serde_json::to_value(record)
        .map_err(|e| Error::bad_argument(format!("record is not serializable: {e}")))?;
    let JsonValue::Object(mut map) = json else {
        return Err(Error::bad_argument(
            "record must serialize to a field mapping",
        ));
    };
    let mut values = Values::new();
    for column in R::columns() {
        let value = match map.remove(*column) {
            Some(field) => registry::adapt(Value::from_json(field)),
            None => Value::Null,
        };
        values = values.set(Col::bound(*column), value);
    }
    if values.is_empty() {
        return Err(Error::bad_argument(format!(
            "no columns resolvable for table {}",
            R::table()
        )));
    }
    Ok(values)
}

/// Materialize a record instance from a result row. Row cells are matched to
/// fields by column name, case-insensitively when no exact match exists.
pub fn record_from_row<R: Record>(row: &Row) -> Result<R> {
    let mut map = serde_json::Map::with_capacity(row.len());
    for column in R::columns() {
        let cell = row.get(column).cloned().or_else(|| {
            row.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, value)| value.clone())
        });
        if let Some(value) = cell {
            map.insert((*column).to_string(), value.into_json());
        }
    }
    serde_json::from_value(JsonValue::Object(map))
        .map_err(|e| Error::bad_argument(format!("row does not match record type: {e}")))
}

/// An equality predicate over the record's primary key, for fetch-back after
/// insert or update.
pub fn pk_predicate<R: Record>(record: &R) -> Result<(Col, Value)> {
    let pk = R::primary_key()
        .ok_or_else(|| Error::bad_argument(format!("table {} has no primary key", R::table())))?;
    let values = values_of(record)?;
    let value = values
        .iter()
        .find(|(col, _)| col.name == pk)
        .map(|(_, value)| value.clone())
        .ok_or_else(|| Error::bad_argument(format!("record has no field for key {pk}")))?;
    Ok((Col::bound(pk), value))
}
