//! End-to-end sync tests against the in-memory destination store.
//!
//! These tests drive `CatalogSync` the way the CLI does and verify:
//! - blank identities are skipped without touching the store
//! - re-applying the same batch is idempotent
//! - generated DDL round-trips with drift detection
//! - a bind failure aborts the whole batch

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use feedsync_core::adapters::{DestinationStore, MemoryStore};
use feedsync_core::ddl::create_table_sql;
use feedsync_core::drift::compare_columns;
use feedsync_core::upsert::upsert;
use feedsync_core::{
    BoundValue, CatalogSync, FeedSyncError, MemorySource, Row, Schema, SqlType, TableConfig,
    TableRegistry,
};

fn offers_registry() -> TableRegistry {
    TableRegistry::new(vec![
        TableConfig::new("offers", ["shop", "offers", "offer"]).with_identity_column("vendorCode"),
    ])
    .unwrap()
}

fn scenario_rows() -> Vec<Row> {
    vec![
        Row::new()
            .with("vendorCode", "101")
            .with("price", "9.99")
            .with("available", "true"),
        Row::new()
            .with("vendorCode", "102")
            .with("price", "abc")
            .with("available", "no"),
        Row::new().with("vendorCode", "").with("price", "1"),
    ]
}

fn sync_with(rows: Vec<Row>) -> CatalogSync<MemorySource, MemoryStore> {
    CatalogSync::new(
        MemorySource::new().with_table("offers", rows),
        MemoryStore::new(),
        offers_registry(),
    )
}

fn text(value: &str) -> BoundValue {
    BoundValue::Text(value.to_string())
}

#[tokio::test]
async fn test_integration_end_to_end_scenario() {
    let mut sync = sync_with(scenario_rows());

    let ddl = sync.table_ddl("offers").unwrap();
    assert_eq!(
        ddl,
        "CREATE TABLE IF NOT EXISTS \"offers\" (\n  \"vendorCode\" bigint,\n  \"price\" text,\n  \"available\" text,\n  CONSTRAINT \"pk_offers\" PRIMARY KEY (\"vendorCode\")\n);\n"
    );

    let summary = sync.update("offers").await.unwrap();
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.rows_skipped, 1);

    let stored = sync.store().rows("offers").await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].get("vendorCode"), Some(&BoundValue::BigInt(101)));
    assert_eq!(stored[0].get("price"), Some(&text("9.99")));
    assert_eq!(stored[0].get("available"), Some(&text("true")));
    assert_eq!(stored[1].get("price"), Some(&text("abc")));
}

#[tokio::test]
async fn test_integration_upsert_is_idempotent() {
    let mut sync = sync_with(scenario_rows());

    sync.update("offers").await.unwrap();
    let first = sync.store().rows("offers").await;

    sync.update("offers").await.unwrap();
    let second = sync.store().rows("offers").await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_integration_only_blank_identities_writes_nothing() {
    let rows = vec![
        Row::new().with("vendorCode", "  ").with("name", "a"),
        Row::new().with_null("vendorCode").with("name", "b"),
    ];
    let mut sync = sync_with(rows);

    let summary = sync.update("offers").await.unwrap();
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.rows_skipped, 2);
    assert!(sync.store().rows("offers").await.is_empty());
}

#[tokio::test]
async fn test_integration_ddl_round_trips_without_drift() {
    let mut sync = sync_with(scenario_rows());
    let ddl = sync.table_ddl("offers").unwrap();

    let store = MemoryStore::new();
    store.execute(&ddl).await.unwrap();

    let schema = Schema::new("offers")
        .with_column("vendorCode", SqlType::BigInt)
        .with_column("price", SqlType::Text)
        .with_column("available", SqlType::Text);
    let live = store.fetch_columns("offers").await.unwrap();
    assert!(compare_columns(&schema, &live).is_clean());
}

#[tokio::test]
async fn test_integration_fractional_prices_fail_bigint_binding() {
    // 9.99 and 1 are both numeric, so price is inferred BIGINT.
    let rows = vec![
        Row::new().with("vendorCode", "1").with("price", "1"),
        Row::new().with("vendorCode", "2").with("price", "9.99"),
    ];
    let mut sync = sync_with(rows);

    match sync.update("offers").await {
        Err(FeedSyncError::Coercion { column, value, .. }) => {
            assert_eq!(column, "price");
            assert_eq!(value, "9.99");
        }
        other => panic!("expected coercion error, got {other:?}"),
    }
    // Table was created, but no row from the failed batch was kept.
    assert!(sync.store().rows("offers").await.is_empty());
}

#[tokio::test]
async fn test_integration_coercion_error_leaves_store_unchanged() {
    let schema = Schema::new("offers")
        .with_column("vendorCode", SqlType::BigInt)
        .with_column("price", SqlType::BigInt);
    let store = MemoryStore::new();
    store
        .execute(&create_table_sql("offers", &schema, Some("vendorCode")).unwrap())
        .await
        .unwrap();

    let good = vec![Row::new().with("vendorCode", "101").with("price", "9")];
    upsert(&store, "offers", "vendorCode", &schema, &good)
        .await
        .unwrap();
    let before = store.rows("offers").await;

    let bad = vec![
        Row::new().with("vendorCode", "101").with("price", "10"),
        Row::new().with("vendorCode", "102").with("price", "abc"),
    ];
    let result = upsert(&store, "offers", "vendorCode", &schema, &bad).await;

    assert!(matches!(result, Err(FeedSyncError::Coercion { .. })));
    assert_eq!(store.rows("offers").await, before);
}

#[tokio::test]
async fn test_integration_out_of_band_column_is_drift() {
    let mut sync = sync_with(scenario_rows());
    sync.update("offers").await.unwrap();

    sync.store()
        .add_column("offers", "legacy", SqlType::Text)
        .await
        .unwrap();

    let error = sync.update("offers").await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Structure changed for table 'offers'. Only in DB: [legacy]; Only in source: []"
    );
}

#[tokio::test]
async fn test_integration_new_source_column_needs_ddl_change() {
    let mut sync = sync_with(scenario_rows());
    sync.update("offers").await.unwrap();
    let (_, store) = sync.into_parts();

    let mut rows = scenario_rows();
    rows[0].insert("weight", Some("3".to_string()));
    let mut sync = CatalogSync::new(
        MemorySource::new().with_table("offers", rows),
        store,
        offers_registry(),
    );

    assert!(matches!(
        sync.update("offers").await,
        Err(FeedSyncError::StructureDrift { .. })
    ));

    let plan = sync.ddl_change("offers").await.unwrap();
    assert_eq!(
        plan.to_string(),
        "ALTER TABLE \"offers\" ADD COLUMN \"weight\" bigint;\n"
    );

    sync.apply_ddl_change("offers").await.unwrap();
    assert_eq!(sync.ddl_change("offers").await.unwrap().to_string(), "-- no changes\n");

    let summary = sync.update("offers").await.unwrap();
    assert_eq!(summary.rows_written, 2);
    let stored = sync.store().rows("offers").await;
    assert_eq!(stored[0].get("weight"), Some(&BoundValue::BigInt(3)));
    assert_eq!(stored[1].get("weight"), Some(&BoundValue::Null(SqlType::BigInt)));
}

#[tokio::test]
async fn test_integration_empty_table_is_no_data() {
    let mut sync = sync_with(Vec::new());
    assert!(matches!(
        sync.update("offers").await,
        Err(FeedSyncError::NoData { .. })
    ));
    assert!(sync.store().table_names().await.is_empty());
}
