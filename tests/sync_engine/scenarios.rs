//! End-to-end runs of the documented sync scenarios.

use std::sync::Arc;

use ledger::SyncStatus;
use mysql_types::TimezonePolicy;
use sync_core::{
    epoch_watermark, ColumnDescriptor, DestinationType, Row, RowBatch, Value,
};
use warehouse::{Operation, Warehouse};
use warehouse_sync::testing::StaticExtractor;
use warehouse_sync::{RunStatus, SyncState};

use crate::harness::{
    destination, order, order_columns, orders_spec, staging, ts, FixedBatch, Harness,
};

#[tokio::test]
async fn test_first_run_on_empty_ledger() {
    let h = Harness::new()
        .with_orders(vec![
            order(1, 10, "2024-03-01 08:00:00"),
            order(2, 20, "2024-03-01 09:30:00"),
            order(3, 30, "2024-03-01 09:00:00"),
        ])
        .await;
    assert_eq!(h.watermark("orders").await, epoch_watermark());

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;

    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(outcome.row_count, 3);
    assert_eq!(outcome.column_count, 3);
    assert_eq!(
        outcome.remark,
        "Table created from source schema. Merge completed successfully"
    );
    assert_eq!(outcome.new_watermark, Some(ts("2024-03-01 09:30:00")));
    assert_eq!(report.status, RunStatus::Success);

    // Extraction started from the epoch sentinel
    let calls = h.source.extract_calls().await;
    assert_eq!(calls, vec![("orders".to_string(), epoch_watermark())]);

    assert_eq!(h.destination_rows("orders").await.len(), 3);
    assert!(h
        .warehouse
        .table(&staging("orders"))
        .await
        .unwrap()
        .rows
        .is_empty());
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 09:30:00"));

    let entry = h.ctx.ledger.entry("orders").await.unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.row_count, 3);
    assert_eq!(entry.column_count, 3);
}

#[tokio::test]
async fn test_new_source_column_is_added() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    warehouse_sync::run(&h.ctx, &[orders_spec()]).await;

    h.source
        .add_column("orders", ColumnDescriptor::new("referral_code", "varchar(32)", true))
        .await;
    h.source
        .insert_rows(
            "orders",
            vec![order(2, 20, "2024-03-02 08:00:00").with("referral_code", "SPRING24")],
        )
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(outcome.new_columns, vec!["referral_code"]);
    assert_eq!(outcome.column_count, 4);
    assert_eq!(
        outcome.remark,
        "Added columns: referral_code. Merge completed successfully"
    );

    let schema = h.warehouse.table(&destination("orders")).await.unwrap().schema;
    assert_eq!(schema.get("referral_code"), Some(DestinationType::String));
    let staging_schema = h.warehouse.table(&staging("orders")).await.unwrap().schema;
    assert_eq!(staging_schema, schema);

    let rows = h.destination_rows("orders").await;
    let new_row = rows
        .iter()
        .find(|r| r.get("id") == Some(&Value::Int(2)))
        .unwrap();
    assert_eq!(
        new_row.get("referral_code"),
        Some(&Value::String("SPRING24".into()))
    );
}

#[tokio::test]
async fn test_stale_duplicate_does_not_overwrite() {
    let h = Harness::new()
        .with_orders(vec![order(7, 999, "2024-03-01 10:00:00")])
        .await;
    let schema = mysql_types::translate_columns(&order_columns());
    h.warehouse
        .seed(
            &destination("orders"),
            schema,
            vec![order(7, 100, "2024-03-01 10:00:00")],
        )
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    assert_eq!(report.table("orders").unwrap().status, SyncStatus::Success);

    let rows = h.destination_rows("orders").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("amount"), Some(&Value::Int(100)));
}

#[tokio::test]
async fn test_empty_extraction_is_success() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let before = h.watermark("orders").await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(outcome.row_count, 0);
    assert_eq!(outcome.remark, "No new or updated rows");
    assert_eq!(outcome.new_watermark, None);
    assert_eq!(h.watermark("orders").await, before);

    // Neither load nor merge ran the second time
    assert_eq!(
        h.warehouse
            .call_count(Operation::LoadReplace, &staging("orders"))
            .await,
        1
    );
    assert_eq!(
        h.warehouse
            .call_count(Operation::Merge, &destination("orders"))
            .await,
        1
    );
}

#[tokio::test]
async fn test_unreachable_source_fails_one_table_only() {
    let h = Harness::new();
    for table in ["customers", "orders", "refunds"] {
        h.source.create_table(table, order_columns()).await;
        h.source
            .insert_rows(table, vec![order(1, 10, "2024-03-01 08:00:00")])
            .await;
    }
    h.source.make_unreachable("orders", "ssh: connect to host bastion port 22: Connection refused").await;

    let specs: Vec<_> = ["customers", "orders", "refunds"]
        .iter()
        .map(|t| sync_core::TableSyncSpec::new(*t, *t))
        .collect();
    let report = warehouse_sync::run(&h.ctx, &specs).await;

    assert_eq!(report.tables.len(), 3);
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.status.exit_code(), 2);

    let failed = report.table("orders").unwrap();
    assert_eq!(failed.status, SyncStatus::Failed);
    assert_eq!(failed.failed_state, Some(SyncState::SchemaCheck));
    assert!(failed
        .remark
        .starts_with("Extraction failed: Connection failed: ssh: connect to host"));
    for ok in ["customers", "refunds"] {
        assert_eq!(report.table(ok).unwrap().status, SyncStatus::Success);
        assert_eq!(h.destination_rows(ok).await.len(), 1);
    }

    // The failure is recorded, and the watermark stays at the sentinel
    let entry = h.ctx.ledger.entry("orders").await.unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Failed);
    assert_eq!(entry.last_success_watermark, None);
    assert_eq!(h.watermark("orders").await, epoch_watermark());
}

#[tokio::test]
async fn test_every_table_failing_is_total_failure() {
    let h = Harness::new();
    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(
        outcome.remark,
        "Extraction failed: Table 'orders' not found in source catalog"
    );
    assert_eq!(report.status.exit_code(), 3);
}

#[tokio::test]
async fn test_failed_merge_is_retried_safely() {
    let h = Harness::new()
        .with_orders(vec![
            order(1, 10, "2024-03-01 08:00:00"),
            order(2, 20, "2024-03-01 09:00:00"),
        ])
        .await;
    h.warehouse
        .fail_on(Operation::Merge, &destination("orders"), "could not serialize access")
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.failed_state, Some(SyncState::Merge));
    assert_eq!(
        outcome.remark,
        "Table created from source schema. Merge failed: Query failed: could not serialize access"
    );
    // Staging kept for inspection, watermark not advanced
    assert_eq!(
        h.warehouse.table(&staging("orders")).await.unwrap().rows.len(),
        2
    );
    assert_eq!(h.watermark("orders").await, epoch_watermark());

    h.warehouse.clear_failures().await;
    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    assert_eq!(report.table("orders").unwrap().status, SyncStatus::Success);
    assert_eq!(h.destination_rows("orders").await.len(), 2);
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 09:00:00"));

    // Both runs extracted the same window
    let calls = h.source.extract_calls().await;
    assert_eq!(calls[0].1, calls[1].1);
}

#[tokio::test]
async fn test_ledger_write_failure_keeps_table_outcome() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    h.ledger_store.reject_writes("ledger table is locked").await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(
        outcome.ledger_error.as_deref(),
        Some("Ledger error: Ledger write rejected: ledger table is locked")
    );
    assert_eq!(report.status, RunStatus::LedgerDegraded);
    assert_eq!(report.status.exit_code(), 4);
    assert_eq!(h.destination_rows("orders").await.len(), 1);
}

#[tokio::test]
async fn test_added_columns_survive_a_failed_load() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    warehouse_sync::run(&h.ctx, &[orders_spec()]).await;

    h.source
        .add_column("orders", ColumnDescriptor::new("channel", "enum('web','app')", true))
        .await;
    h.source
        .insert_rows(
            "orders",
            vec![order(2, 20, "2024-03-02 08:00:00").with("channel", "web")],
        )
        .await;
    h.warehouse
        .fail_on(Operation::LoadReplace, &staging("orders"), "disk full")
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.failed_state, Some(SyncState::StageLoad));
    assert_eq!(outcome.new_columns, vec!["channel"]);
    assert_eq!(
        outcome.remark,
        "Added columns: channel. Load failed: Query failed: disk full"
    );

    let schema = h.warehouse.table(&destination("orders")).await.unwrap().schema;
    assert!(schema.contains("channel"));
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 08:00:00"));
}

#[tokio::test]
async fn test_row_without_watermark_fails_batch() {
    let source = Arc::new(StaticExtractor::new());
    let extractor = Arc::new(FixedBatch {
        columns: order_columns(),
        batch: RowBatch::new(
            vec!["id".into(), "amount".into(), "updated_at".into()],
            vec![
                order(1, 10, "2024-03-01 08:00:00"),
                Row::new().with("id", 2).with("amount", 5).with("updated_at", Value::Null),
            ],
        ),
    });
    let h = Harness::with_extractor(source, extractor);

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.failed_state, Some(SyncState::Translate));
    assert!(outcome.remark.ends_with(
        "Invalid batch: Row 1 has no value for watermark column 'updated_at'"
    ));
    assert!(h.destination_rows("orders").await.is_empty());
}

#[tokio::test]
async fn test_impossible_source_dates_sync_as_null() {
    use mysql_async::Value as MySqlValue;

    let decoded = |id: i64, shipped_at: MySqlValue| {
        Row::new()
            .with("id", mysql_types::mysql_value_to_value(MySqlValue::Int(id)))
            .with("shipped_at", mysql_types::mysql_value_to_value(shipped_at))
            .with(
                "updated_at",
                mysql_types::mysql_value_to_value(MySqlValue::Date(2024, 3, 1, 8, 0, 0, 0)),
            )
    };
    let source = Arc::new(StaticExtractor::new());
    let extractor = Arc::new(FixedBatch {
        columns: vec![
            ColumnDescriptor::new("id", "int(11)", false),
            ColumnDescriptor::new("shipped_at", "datetime", true),
            ColumnDescriptor::new("updated_at", "datetime", false),
        ],
        batch: RowBatch::new(
            vec!["id".into(), "shipped_at".into(), "updated_at".into()],
            vec![
                decoded(1, MySqlValue::Date(2024, 0, 0, 0, 0, 0, 0)),
                decoded(2, MySqlValue::Date(2024, 2, 31, 12, 0, 0, 0)),
                decoded(3, MySqlValue::Date(2024, 2, 29, 12, 0, 0, 0)),
            ],
        ),
    });
    let h = Harness::with_extractor(source, extractor);

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(outcome.row_count, 3);

    let shipped: Vec<Option<Value>> = h
        .destination_rows("orders")
        .await
        .iter()
        .map(|r| r.get("shipped_at").cloned())
        .collect();
    assert_eq!(
        shipped,
        vec![
            Some(Value::Null),
            Some(Value::Null),
            Some(Value::Timestamp(ts("2024-02-29 12:00:00"))),
        ]
    );
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 08:00:00"));
}

#[tokio::test]
async fn test_numeric_placeholders_and_offsets_are_coerced() {
    let source = Arc::new(StaticExtractor::new());
    let utc_ten = chrono::DateTime::parse_from_rfc3339("2024-03-01T10:00:00+00:00").unwrap();
    let extractor = Arc::new(FixedBatch {
        columns: vec![
            ColumnDescriptor::new("id", "int(11)", false),
            ColumnDescriptor::new("amount", "decimal(10,2)", true),
            ColumnDescriptor::new("updated_at", "timestamp", false),
        ],
        batch: RowBatch::new(
            vec!["id".into(), "amount".into(), "updated_at".into()],
            vec![Row::new()
                .with("id", 1)
                .with("amount", " NULL ")
                .with("updated_at", Value::TimestampTz(utc_ten))],
        ),
    });
    let mut h = Harness::with_extractor(source, extractor);
    h.ctx = h
        .ctx
        .with_timezone(TimezonePolicy::from_name("Africa/Lagos").unwrap());

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    assert_eq!(report.table("orders").unwrap().status, SyncStatus::Success);

    let rows = h.destination_rows("orders").await;
    assert_eq!(rows[0].get("amount"), Some(&Value::Null));
    // Lagos is UTC+1 and stored naive
    assert_eq!(
        rows[0].get("updated_at"),
        Some(&Value::Timestamp(ts("2024-03-01 11:00:00")))
    );
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 11:00:00"));
}

#[tokio::test]
async fn test_uncleared_staging_is_noted_in_remark() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    h.warehouse
        .fail_on(Operation::Truncate, &staging("orders"), "lock timeout")
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(
        outcome.remark,
        "Table created from source schema. Merge completed successfully \
         (staging table analytics_staging.orders_staging not cleared: Query failed: lock timeout)"
    );
    assert_eq!(h.watermark("orders").await, ts("2024-03-01 08:00:00"));

    // The next load replaces the leftover staging rows
    h.warehouse.clear_failures().await;
    h.source
        .insert_rows("orders", vec![order(2, 20, "2024-03-02 08:00:00")])
        .await;
    warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    assert_eq!(h.destination_rows("orders").await.len(), 2);
    assert!(h
        .warehouse
        .table(&staging("orders"))
        .await
        .unwrap()
        .rows
        .is_empty());
}

#[tokio::test]
async fn test_existing_destination_is_not_recreated() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    let schema = mysql_types::translate_columns(&order_columns());
    h.warehouse
        .create_table(&destination("orders"), &schema)
        .await
        .unwrap();

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.remark, "Merge completed successfully");
    assert_eq!(
        h.warehouse
            .call_count(Operation::CreateTable, &destination("orders"))
            .await,
        1
    );
}
