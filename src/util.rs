//! JSON helpers with timestamp coercion.
//!
//! The stock transformer pair for JSON columns: [`json_dumps`] serializes
//! with datetimes rendered as ISO-8601 UTC strings and keys sorted;
//! [`json_loads`] parses and revives ISO-8601 strings it finds back into
//! canonical UTC form. Register them as an adapter/converter pair to move
//! structured values through JSON columns.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// Serialize to a JSON string with sorted keys. Returns `None` for `None`.
pub fn json_dumps(data: Option<&JsonValue>) -> Option<String> {
    let data = data?;
    let sorted = sort_keys(data.clone());
    serde_json::to_string(&sorted).ok()
}

/// Parse a JSON string, reviving ISO-8601 datetime strings into canonical
/// RFC 3339 UTC form. Returns the input text unparsed on malformed JSON.
pub fn json_loads(text: &str) -> JsonValue {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(value) => revive_datetimes(value),
        Err(_) => JsonValue::String(text.to_string()),
    }
}

/// Try to parse a string as an ISO-8601 datetime. Unaware values are taken
/// as UTC. Returns `None` when the string is not a datetime.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if text.len() < 19 {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // "YYYY-MM-DD HH:MM:SS" with a space separator, optional fraction.
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn sort_keys(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

fn revive_datetimes(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.into_iter()
                .map(|(k, v)| (k, revive_datetimes(v)))
                .collect(),
        ),
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(revive_datetimes).collect())
        }
        JsonValue::String(s) => match parse_datetime(&s) {
            Some(dt) => JsonValue::String(dt.to_rfc3339()),
            None => JsonValue::String(s),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_dumps_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(
            json_dumps(Some(&value)).unwrap(),
            "{\"a\":{\"c\":3,\"d\":2},\"b\":1}"
        );
        assert_eq!(json_dumps(None), None);
    }

    #[test]
    fn test_json_loads_revives_datetimes() {
        let parsed = json_loads("{\"at\": \"2022-11-18 10:30:00\"}");
        assert_eq!(parsed["at"], json!("2022-11-18T10:30:00+00:00"));
    }

    #[test]
    fn test_json_loads_passes_bad_json_through() {
        assert_eq!(json_loads("not json"), json!("not json"));
    }

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime("2022-11-18T10:30:00Z").is_some());
        assert!(parse_datetime("2022-11-18 10:30:00.250").is_some());
        let offset = parse_datetime("2022-11-18T10:30:00+03:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2022-11-18T07:30:00+00:00");
        assert!(parse_datetime("plain text").is_none());
        assert!(parse_datetime("2022-11-18").is_none());
    }
}
