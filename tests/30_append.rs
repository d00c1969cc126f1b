mod common;

use anyhow::Result;
use doctable::engine::EngineError;
use serde_json::json;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_rows_are_skipped() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("a", "a", "integer"), ("b", "b", "text")]).await?;
    db.engine.materialize(id).await?;

    let first = db.engine.append(id, r#"[{"a": 1, "b": "x"}]"#).await?;
    assert_eq!(first.inserted_count, 1);

    let second = db
        .engine
        .append(id, r#"[{"a": 1, "b": "x"}, {"a": 2, "b": "x"}]"#)
        .await?;
    assert_eq!(second.inserted_count, 1);
    assert_eq!(db.row_count(&table).await?, 2);

    // Repeats inside one payload collapse too
    let third = db
        .engine
        .append(id, r#"[{"a": 3, "b": "y"}, {"a": 3, "b": "y"}]"#)
        .await?;
    assert_eq!(third.inserted_count, 1);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn nulls_match_nulls() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("a", "a", "integer"), ("b", "b", "text")]).await?;
    db.engine.materialize(id).await?;

    let payload = r#"[{"a": null, "b": "x"}]"#;
    assert_eq!(db.engine.append(id, payload).await?.inserted_count, 1);
    assert_eq!(db.engine.append(id, payload).await?.inserted_count, 0);
    assert_eq!(db.row_count(&table).await?, 1);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn missing_field_rejects_whole_payload() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("a", "a", "integer"), ("b", "b", "text")]).await?;
    db.engine.materialize(id).await?;

    let err = db
        .engine
        .append(id, r#"[{"a": 1, "b": "x"}, {"a": 2}]"#)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedPayload(_)));
    assert_eq!(db.row_count(&table).await?, 0);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn display_keys_with_spaces_map_to_underscores() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, _) = db
        .register(&[
            ("amount", "Unit Price", "DECIMAL(10, 2)"),
            ("sold_at", "Sold At", "datetime"),
            ("paid", "Paid", "boolean"),
        ])
        .await?;
    db.engine.materialize(id).await?;

    let outcome = db
        .engine
        .append(
            id,
            r#"[{"Unit_Price": "2.5", "Sold_At": "2024-01-01T13:01:01", "Paid": true}]"#,
        )
        .await?;
    assert_eq!(outcome.inserted_count, 1);

    let projection = db.engine.describe_and_fetch(id).await?;
    let row = &projection.rows[0];
    assert_eq!(row["amount"], json!("2.50"));
    assert_eq!(row["sold_at"], json!("2024-01-01T13:01:01"));
    assert_eq!(row["paid"], json!(true));

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn append_before_materialize_fails() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, _) = db.register(&[("a", "a", "integer")]).await?;

    let err = db.engine.append(id, r#"[{"a": 1}]"#).await.unwrap_err();
    assert!(matches!(err, EngineError::NotMaterialized { .. }));

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_identical_appends_insert_once() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("a", "a", "integer"), ("b", "b", "text")]).await?;
    db.engine.materialize(id).await?;

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let engine = db.engine.clone();
            tokio::spawn(async move { engine.append(id, r#"[{"a": 7, "b": "z"}]"#).await })
        })
        .collect();

    let mut inserted = 0;
    for task in tasks {
        inserted += task.await??.inserted_count;
    }
    assert_eq!(inserted, 1);
    assert_eq!(db.row_count(&table).await?, 1);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn repeated_pair_then_one_new_pair() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("a", "a", "integer"), ("b", "b", "text")]).await?;
    db.engine.materialize(id).await?;

    let first = db
        .engine
        .append(id, r#"[{"a": 1, "b": "x"}, {"a": 1, "b": "x"}]"#)
        .await?;
    assert_eq!(first.inserted_count, 1);
    assert_eq!(db.row_count(&table).await?, 1);

    let second = db
        .engine
        .append(id, r#"[{"a": 1, "b": "x"}, {"a": 1, "b": "y"}]"#)
        .await?;
    assert_eq!(second.inserted_count, 1);
    assert_eq!(db.row_count(&table).await?, 2);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn offset_datetimes_keep_distinct_instants() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, table) = db.register(&[("sold_at", "Sold At", "datetime")]).await?;
    db.engine.materialize(id).await?;

    db.engine
        .append(id, r#"[{"Sold_At": "2024-01-01T13:01:01+05:00"}]"#)
        .await?;
    let utc = db
        .engine
        .append(id, r#"[{"Sold_At": "2024-01-01T13:01:01Z"}]"#)
        .await?;
    assert_eq!(utc.inserted_count, 1);
    assert_eq!(db.row_count(&table).await?, 2);

    // Same instant as the first row, written in UTC
    let same = db
        .engine
        .append(id, r#"[{"Sold_At": "2024-01-01T08:01:01Z"}]"#)
        .await?;
    assert_eq!(same.inserted_count, 0);

    let projection = db.engine.describe_and_fetch(id).await?;
    let stamps: Vec<_> = projection.rows.iter().map(|r| r["sold_at"].clone()).collect();
    assert_eq!(stamps, vec![json!("2024-01-01T08:01:01"), json!("2024-01-01T13:01:01")]);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn empty_payload_before_materialize_fails() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, _) = db.register(&[("a", "a", "integer")]).await?;

    let err = db.engine.append(id, "[]").await.unwrap_err();
    assert!(matches!(err, EngineError::NotMaterialized { .. }));

    db.engine.materialize(id).await?;
    assert_eq!(db.engine.append(id, "[]").await?.inserted_count, 0);

    db.cleanup().await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn declared_scale_is_kept() -> Result<()> {
    let mut db = common::connect().await?;
    let (id, _) = db.register(&[("rate", "Rate", "DECIMAL(12, 4)")]).await?;
    db.engine.materialize(id).await?;

    db.engine.append(id, r#"[{"Rate": "2.5"}]"#).await?;

    let projection = db.engine.describe_and_fetch(id).await?;
    assert_eq!(projection.rows[0]["rate"], json!("2.5000"));

    db.cleanup().await
}
