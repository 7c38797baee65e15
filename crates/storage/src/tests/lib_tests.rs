use super::*;
use shared::domain::SequenceItem;

fn venues() -> Category {
    Category::new("venues").expect("category")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("sequencer.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn lists_entities_in_id_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let a = storage.create_entity("Bar A").await.expect("entity");
    let b = storage.create_entity("Bar B").await.expect("entity");

    let entities = storage.fetch_entities().await.expect("entities");
    assert_eq!(
        entities,
        vec![
            Entity { id: a, display_name: "Bar A".into() },
            Entity { id: b, display_name: "Bar B".into() },
        ]
    );
}

#[tokio::test]
async fn rename_and_delete_report_missing_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage.create_entity("Bar A").await.expect("entity");

    assert!(storage.rename_entity(id, "Bar Z").await.expect("rename"));
    assert!(!storage.rename_entity(EntityId(999), "nope").await.expect("rename"));
    assert_eq!(
        storage.fetch_entities().await.expect("entities")[0].display_name,
        "Bar Z"
    );

    assert!(storage.delete_entity(id).await.expect("delete"));
    assert!(!storage.delete_entity(id).await.expect("delete again"));
}

#[tokio::test]
async fn missing_category_is_not_an_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let record = storage.fetch_sequence(&venues()).await.expect("fetch");
    assert!(record.is_none());
    assert!(storage.list_categories().await.expect("categories").is_empty());
}

#[tokio::test]
async fn upsert_replaces_previous_record() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = SequenceRecord {
        category: venues(),
        sequence: vec![
            SequenceItem { id: EntityId(1), position: 1 },
            SequenceItem { id: EntityId(2), position: 2 },
        ],
    };
    storage.upsert_sequence(&first).await.expect("first upsert");

    let second = SequenceRecord {
        category: venues(),
        sequence: vec![SequenceItem { id: EntityId(3), position: 1 }],
    };
    storage.upsert_sequence(&second).await.expect("second upsert");

    let stored = storage
        .fetch_sequence(&venues())
        .await
        .expect("fetch")
        .expect("record");
    assert_eq!(stored, second);
    assert_eq!(storage.list_categories().await.expect("categories"), vec![venues()]);
}

#[tokio::test]
async fn empty_sequence_is_stored_not_absent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .upsert_sequence(&SequenceRecord::empty(venues()))
        .await
        .expect("upsert");

    let stored = storage.fetch_sequence(&venues()).await.expect("fetch");
    assert_eq!(stored, Some(SequenceRecord::empty(venues())));
}

#[tokio::test]
async fn stored_rows_are_normalized_on_read() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("INSERT INTO sequence_records (category, sequence) VALUES (?, ?)")
        .bind("venues")
        .bind(r#"[{"id":"7","position":3},{"id":4,"position":1},{"id":7,"position":9}]"#)
        .execute(storage.pool())
        .await
        .expect("raw insert");

    let stored = storage
        .fetch_sequence(&venues())
        .await
        .expect("fetch")
        .expect("record");
    assert_eq!(
        stored.sequence,
        vec![
            SequenceItem { id: EntityId(4), position: 1 },
            SequenceItem { id: EntityId(7), position: 2 },
        ]
    );
}

#[tokio::test]
async fn corrupt_sequence_json_is_a_fetch_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("INSERT INTO sequence_records (category, sequence) VALUES (?, ?)")
        .bind("venues")
        .bind("not json")
        .execute(storage.pool())
        .await
        .expect("raw insert");

    let err = storage.fetch_sequence(&venues()).await.expect_err("should fail");
    assert!(err.to_string().contains("not valid JSON"));
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), DEFAULT_DATABASE_URL);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn memory_urls_have_no_file_path() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/x.db?mode=rwc"),
        Some(PathBuf::from("./data/x.db"))
    );
}

#[tokio::test]
async fn categories_are_listed_in_name_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let bars = Category::new("bars").expect("category");
    storage
        .upsert_sequence(&SequenceRecord::empty(venues()))
        .await
        .expect("venues");
    storage
        .upsert_sequence(&SequenceRecord::empty(bars.clone()))
        .await
        .expect("bars");

    assert_eq!(
        storage.list_categories().await.expect("categories"),
        vec![bars, venues()]
    );
}
