//! Parameter and result value model.
//!
//! [`Value`] is the engine-neutral value that flows out as a bound parameter
//! and back in as a result cell. [`Row`] is an ordered column-name-to-value
//! mapping, the default shape of fetched rows. [`Params`] carries raw
//! `execute` arguments, positional or named.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// A parameter or result cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Structured JSON value
    Json(JsonValue),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }

    /// The integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The textual content, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Convert a host value through the adapter registry, falling back to the
    /// plain [`From`] conversion when no adapter is registered for `T`.
    pub fn from_host<T>(host: &T) -> Value
    where
        T: std::any::Any + Clone + Into<Value>,
    {
        match crate::registry::adapt_host(host) {
            Some(adapted) => adapted,
            None => host.clone().into(),
        }
    }

    /// Lower a JSON value into the closest engine value. Scalars map to their
    /// native variants; arrays and objects stay JSON.
    pub fn from_json(json: JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }

    /// Raise the value into JSON, for record materialization. Binary data
    /// becomes a base64 string.
    pub fn into_json(self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Int(i) => JsonValue::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(s) => JsonValue::String(s),
            Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
            Value::Json(j) => j,
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// A fetched row: column names in result order, mapped to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    /// Create a row from (column, value) pairs, preserving order.
    pub fn from_pairs(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Value for a column, or `None` if the column is absent.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in result order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over (column, value) pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the row into its (column, value) pairs.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.entries
    }

    /// Convert the row into a JSON object, in column order.
    pub fn into_json_map(self) -> serde_json::Map<String, JsonValue> {
        self.entries
            .into_iter()
            .map(|(name, value)| (name, value.into_json()))
            .collect()
    }

    /// Replace a cell in place; appends when the column is absent.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Raw `execute` parameters: positional, or named for `:name` placeholders.
#[derive(Debug, Clone, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Positional parameters bound in order.
    Positional(Vec<Value>),
    /// Named parameters for `:name` placeholders, rendered per dialect.
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Whether the parameter set is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(v) => v.is_empty(),
            Params::Named(v) => v.is_empty(),
        }
    }

    /// Render onto the statement: positional parameters pass through; named
    /// parameters substitute `:name` placeholders in order of appearance with
    /// the dialect's positional placeholder (`placeholder(n)` is handed the
    /// 1-based parameter position).
    pub(crate) fn render(
        self,
        sql: &str,
        placeholder: impl Fn(usize) -> String,
    ) -> Result<(String, Vec<Value>)> {
        match self {
            Params::None => Ok((sql.to_string(), Vec::new())),
            Params::Positional(values) => Ok((sql.to_string(), values)),
            Params::Named(pairs) => {
                let mut out = Vec::with_capacity(sql.len());
                let mut values = Vec::new();
                let bytes = sql.as_bytes();
                let mut i = 0;
                while i < bytes.len() {
                    if bytes[i] == b':'
                        && i + 1 < bytes.len()
                        && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_')
                        && (i == 0 || bytes[i - 1] != b':')
                    {
                        let start = i + 1;
                        let mut end = start;
                        while end < bytes.len()
                            && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                        {
                            end += 1;
                        }
                        let name = &sql[start..end];
                        let value = pairs
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| {
                                Error::bad_argument(format!("unbound parameter :{name}"))
                            })?;
                        values.push(value);
                        out.extend_from_slice(placeholder(values.len()).as_bytes());
                        i = end;
                    } else {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
                let out = String::from_utf8(out)
                    .map_err(|_| Error::bad_argument("statement is not valid UTF-8"))?;
                Ok((out, values))
            }
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Positional(v)
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(v: [Value; N]) -> Self {
        Params::Positional(v.to_vec())
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(v: Vec<(String, Value)>) -> Self {
        Params::Named(v)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}
