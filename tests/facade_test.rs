//! Integration tests for the query facade on the embedded engine.
//!
//! Covers the structured operation surface end to end: insert/fetch round
//! trips, WHERE predicate shapes, ordering, limits, raw execution, and
//! identifier quoting.

use dbkit::{Database, Params, Queryable, Select, Value, Values, Where};

/// Each test opens its own database file so instances never collide across
/// concurrently running tests.
async fn setup() -> Database {
    let path = tempfile::NamedTempFile::new()
        .unwrap()
        .into_temp_path()
        .keep()
        .unwrap();
    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    db.executescript("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn test_in_with_null_element_matches_strictly() {
    let db = setup().await;
    db.insert("t", [("val", Value::Null)]).await.unwrap();
    db.insert("t", [("val", Value::from("a"))]).await.unwrap();

    // NULL never compares equal inside IN, so only the "a" row matches.
    let rows = db
        .fetchall(
            "t",
            Select::new().filter(Where::new().is_in("val", [Value::Null, Value::from("a")])),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("val"), Some(&Value::Text("a".into())));

    // Empty membership is the false tautology; no rows, no error.
    let rows = db
        .fetchall(
            "t",
            Select::new().filter(Where::new().is_in("val", Vec::<Value>::new())),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    // Negated empty membership emits NOT IN (NULL); under strict SQL NULL
    // comparison that also matches nothing.
    let rows = db
        .fetchall(
            "t",
            Select::new().filter(Where::new().not_in("val", Vec::<Value>::new())),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    db.close().await;
}

#[tokio::test]
async fn test_mixed_expression_and_equality_clauses() {
    let db = setup().await;
    for val in ["a", "b", "a"] {
        db.insert("t", [("val", Value::from(val))]).await.unwrap();
    }

    let rows = db
        .fetchall(
            "t",
            Select::new().filter(
                Where::new()
                    .raw("id < ? OR id > ?", [Value::Int(1), Value::Int(2)])
                    .eq("val", "a"),
            ),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(3)));

    db.close().await;
}

#[tokio::test]
async fn test_update_and_fetchone() {
    let db = setup().await;
    db.insert("t", [("val", Value::from("a"))]).await.unwrap();
    db.insert("t", [("val", Value::from("b"))]).await.unwrap();

    let affected = db
        .update("t", [("val", "z")], [("id", Value::Int(2))])
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let row = db
        .fetchone("t", Select::from(Where::new().eq("id", 2i64)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("val"), Some(&Value::Text("z".into())));

    let missing = db
        .fetchone("t", Select::from(Where::new().eq("id", 99i64)))
        .await
        .unwrap();
    assert!(missing.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_delete_with_operators() {
    let db = setup().await;
    for val in ["a", "b", "c"] {
        db.insert("t", [("val", Value::from(val))]).await.unwrap();
    }

    let affected = db
        .delete("t", Where::new().cmp("id", ">=", 2i64))
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(db.fetchall("t", Select::new()).await.unwrap().len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_limit_and_offset() {
    let db = setup().await;
    for val in ["a", "b", "c", "d"] {
        db.insert("t", [("val", Value::from(val))]).await.unwrap();
    }

    let rows = db
        .fetchall("t", Select::new().order("id").limit(2i64))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let rows = db
        .fetchall("t", Select::new().order("id").limit((2i64, 1i64)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(2)));

    // Offset without limit: unbounded tail.
    let rows = db
        .fetchall("t", Select::new().order("id").limit((-1i64, 3i64)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(4)));

    db.close().await;
}

#[tokio::test]
async fn test_insertmany_and_executemany() {
    let db = setup().await;

    let keys = db
        .insertmany(
            "t",
            vec![
                Values::new().set("val", "a"),
                Values::new().set("val", "b"),
                Values::new().set("val", Value::Null),
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        keys,
        vec![
            Some(Value::Int(1)),
            Some(Value::Int(2)),
            Some(Value::Int(3)),
        ]
    );

    db.executemany(
        "UPDATE t SET val = ? WHERE id = ?",
        vec![
            Params::Positional(vec![Value::from("x"), Value::Int(1)]),
            Params::Positional(vec![Value::from("y"), Value::Int(2)]),
        ],
    )
    .await
    .unwrap();

    let row = db
        .fetchone("t", Select::from(Where::new().eq("id", 1i64)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("val"), Some(&Value::Text("x".into())));

    db.close().await;
}

#[tokio::test]
async fn test_execute_with_named_params() {
    let db = setup().await;
    db.insert("t", [("val", Value::from("a"))]).await.unwrap();
    db.insert("t", [("val", Value::from("b"))]).await.unwrap();

    let mut cursor = db
        .execute(
            "SELECT val FROM t WHERE id = :id",
            vec![("id".to_string(), Value::Int(2))],
        )
        .await
        .unwrap();
    let row = cursor.fetchone().unwrap();
    assert_eq!(row.get("val"), Some(&Value::Text("b".into())));

    let cursor = db
        .execute("DELETE FROM t WHERE id = :id", vec![("id".to_string(), Value::Int(1))])
        .await
        .unwrap();
    assert_eq!(cursor.rowcount(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_quote_is_unconditional_and_idempotent() {
    let db = setup().await;
    assert_eq!(db.quote("where"), "\"where\"");
    assert_eq!(db.quote("plain"), "\"plain\"");
    let once = db.quote("some name");
    assert_eq!(db.quote(&once), once);
    db.close().await;
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let db = setup().await;
    db.close().await;
    let result = db.fetchall("t", Select::new()).await;
    assert!(matches!(result, Err(dbkit::Error::NotOpen)));
}
