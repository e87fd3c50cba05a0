//! Transaction scope semantics on the embedded engine.

use std::sync::Arc;

use dbkit::{Database, Error, Queryable, Select, Value, Where};

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
async fn test_commit_on_close() {
    let db = setup().await;

    let tx = db.transaction().begin().await.unwrap();
    tx.insert("t", [("val", Value::from("a"))]).await.unwrap();
    tx.insert("t", [("val", Value::from("b"))]).await.unwrap();
    tx.close(None).await.unwrap();

    assert_eq!(db.fetchall("t", Select::new()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rollback_on_close() {
    let db = setup().await;
    db.insert("t", [("val", Value::from("pre"))]).await.unwrap();

    let tx = db.transaction().commit(false).begin().await.unwrap();
    tx.insert("t", [("val", Value::from("a"))]).await.unwrap();
    tx.close(None).await.unwrap();

    let rows = db.fetchall("t", Select::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("val"), Some(&Value::Text("pre".into())));
}

#[tokio::test]
async fn test_rollback_sentinel_suppressed_by_scope() {
    let db = setup().await;
    db.insert("t", [("val", Value::from("pre"))]).await.unwrap();

    let outcome = db
        .run_in_transaction(|tx| {
            Box::pin(async move {
                tx.insert("t", [("val", Value::from("a"))]).await?;
                tx.insert("t", [("val", Value::from("b"))]).await?;
                Err::<(), _>(Error::Rollback)
            })
        })
        .await
        .unwrap();
    assert!(outcome.is_none());

    // Only the pre-scope row survives.
    let rows = db.fetchall("t", Select::new()).await.unwrap();
    assert_eq!(rows.len(), 1);

    // The same scope without the sentinel keeps its work.
    let outcome = db
        .run_in_transaction(|tx| {
            Box::pin(async move {
                tx.insert("t", [("val", Value::from("kept"))]).await?;
                Ok(true)
            })
        })
        .await
        .unwrap();
    assert_eq!(outcome, Some(true));
    assert_eq!(db.fetchall("t", Select::new()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_other_errors_propagate_after_rollback() {
    let db = setup().await;

    let result = db
        .run_in_transaction(|tx| {
            Box::pin(async move {
                tx.insert("t", [("val", Value::from("a"))]).await?;
                tx.execute("SELECT * FROM no_such_table", ()).await?;
                Ok(())
            })
        })
        .await;
    assert!(matches!(result, Err(Error::Driver { .. })));
    assert!(db.fetchall("t", Select::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scope_is_reusable_across_commit_and_rollback() {
    let db = setup().await;

    let tx = db.transaction().begin().await.unwrap();
    tx.insert("t", [("val", Value::from("a"))]).await.unwrap();
    tx.commit().await.unwrap();

    tx.insert("t", [("val", Value::from("discarded"))])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    tx.insert("t", [("val", Value::from("b"))]).await.unwrap();
    tx.close(Some(true)).await.unwrap();

    let rows = db.fetchall("t", Select::new().order("id")).await.unwrap();
    let vals: Vec<_> = rows
        .iter()
        .map(|r| r.get("val").cloned().unwrap())
        .collect();
    assert_eq!(vals, vec![Value::Text("a".into()), Value::Text("b".into())]);
}

#[tokio::test]
async fn test_update_and_delete_within_scope() {
    let db = setup().await;
    db.insert("t", [("val", Value::from("a"))]).await.unwrap();
    db.insert("t", [("val", Value::from("b"))]).await.unwrap();

    let tx = db.transaction().begin().await.unwrap();
    let affected = tx
        .update("t", [("val", "z")], [("id", Value::Int(1))])
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let removed = tx.delete("t", [("id", Value::Int(2))]).await.unwrap();
    assert_eq!(removed, 1);
    tx.close(None).await.unwrap();

    let rows = db.fetchall("t", Select::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("val"), Some(&Value::Text("z".into())));
}

#[tokio::test]
async fn test_closed_scope_rejects_operations() {
    let db = setup().await;
    let tx = db.transaction().begin().await.unwrap();
    tx.close(None).await.unwrap();

    let result = tx.insert("t", [("val", Value::from("a"))]).await;
    assert!(matches!(result, Err(Error::NotOpen)));
    // Closing again is a no-op.
    tx.close(None).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exclusive_scopes_serialize() {
    let db = Arc::new(setup().await);

    let mut handles = Vec::new();
    for i in 0..4i64 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let tx = db.transaction().begin().await.unwrap();
            let seen = tx.fetchall("t", Select::new()).await.unwrap().len() as i64;
            tx.insert("t", [("val", Value::from(format!("task-{i}-saw-{seen}")))])
                .await
                .unwrap();
            tx.close(None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every scope ran in isolation: four rows, one per scope.
    assert_eq!(db.fetchall("t", Select::new()).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_integrity_failure_classification() {
    let db = setup().await;
    db.executescript("CREATE UNIQUE INDEX uniq_val ON t (val)")
        .await
        .unwrap();
    db.insert("t", [("val", Value::from("a"))]).await.unwrap();

    let result = db.insert("t", [("val", Value::from("a"))]).await;
    match result {
        Err(err) => assert!(err.is_integrity(), "expected integrity error, got {err}"),
        Ok(_) => panic!("duplicate insert should fail"),
    }

    let rows = db
        .fetchall("t", Select::from(Where::new().eq("val", "a")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
