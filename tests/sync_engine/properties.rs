//! Properties that must hold across any sequence of runs.

use sync_core::{ColumnDescriptor, Value};
use warehouse::{Operation, StagingLoader, TableManager, Warehouse};

use crate::harness::{destination, order, order_columns, orders_spec, staging, ts, Harness};

#[tokio::test]
async fn test_merging_same_staging_twice_changes_nothing() {
    let h = Harness::new();
    let schema = mysql_types::translate_columns(&order_columns());
    let manager = TableManager::new(h.warehouse.as_ref());
    manager
        .ensure_exists(&destination("orders"), &schema)
        .await
        .unwrap();
    manager.ensure_staging(&staging("orders"), &schema).await.unwrap();

    let columns: Vec<String> = schema.names().map(str::to_string).collect();
    let rows = vec![
        order(1, 10, "2024-03-01 08:00:00"),
        order(2, 20, "2024-03-01 09:00:00"),
    ];
    h.warehouse
        .load_replace(&staging("orders"), &schema, &rows)
        .await
        .unwrap();
    h.warehouse
        .merge(
            &warehouse::MergePlan::new(
                destination("orders"),
                staging("orders"),
                "id",
                "updated_at",
                columns.clone(),
            )
            .unwrap(),
        )
        .await
        .unwrap();
    let once = h.destination_rows("orders").await;

    // Re-stage the identical batch and merge through the loader
    let loader = StagingLoader::new(h.warehouse.as_ref());
    let batch = sync_core::RowBatch::new(columns.clone(), rows);
    loader.load(&batch, &staging("orders"), &schema).await.unwrap();
    let outcome = loader
        .merge(&orders_spec(), &staging("orders"), &destination("orders"), columns)
        .await
        .unwrap();

    assert_eq!(outcome.affected, 0);
    assert_eq!(h.destination_rows("orders").await, once);
}

#[tokio::test]
async fn test_watermark_is_monotone_across_runs() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    let mut previous = h.watermark("orders").await;

    // success, empty, failure, success
    let steps: Vec<(Vec<sync_core::Row>, bool)> = vec![
        (vec![], false),
        (vec![], false),
        (vec![order(2, 20, "2024-03-02 08:00:00")], true),
        (vec![order(3, 30, "2024-03-03 08:00:00")], false),
    ];
    let mut expected = vec![
        ts("2024-03-01 08:00:00"),
        ts("2024-03-01 08:00:00"),
        ts("2024-03-01 08:00:00"),
        ts("2024-03-03 08:00:00"),
    ]
    .into_iter();

    for (rows, fail_merge) in steps {
        h.source.insert_rows("orders", rows).await;
        if fail_merge {
            h.warehouse
                .fail_on(Operation::Merge, &destination("orders"), "timeout")
                .await;
        } else {
            h.warehouse.clear_failures().await;
        }
        warehouse_sync::run(&h.ctx, &[orders_spec()]).await;

        let current = h.watermark("orders").await;
        assert!(current >= previous);
        assert_eq!(Some(current), expected.next());
        previous = current;
    }

    // Row 2 landed once the failed window was retried
    let ids: Vec<Value> = h
        .destination_rows("orders")
        .await
        .iter()
        .filter_map(|r| r.get("id").cloned())
        .collect();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[tokio::test]
async fn test_schema_only_grows() {
    let h = Harness::new()
        .with_orders(vec![order(1, 10, "2024-03-01 08:00:00")])
        .await;
    warehouse_sync::run(&h.ctx, &[orders_spec()]).await;

    // Source drops `amount` and gains `note`
    h.source
        .create_table(
            "orders",
            vec![
                ColumnDescriptor::new("id", "int(11)", false),
                ColumnDescriptor::new("updated_at", "datetime", false),
                ColumnDescriptor::new("note", "text", true),
            ],
        )
        .await;
    h.source
        .insert_rows(
            "orders",
            vec![sync_core::Row::new()
                .with("id", 1)
                .with("updated_at", ts("2024-03-02 08:00:00"))
                .with("note", "gift wrap")],
        )
        .await;

    let report = warehouse_sync::run(&h.ctx, &[orders_spec()]).await;
    let outcome = report.table("orders").unwrap();
    assert_eq!(outcome.new_columns, vec!["note"]);
    assert_eq!(outcome.column_count, 4);

    let table = h.warehouse.table(&destination("orders")).await.unwrap();
    let names: Vec<&str> = table.schema.names().collect();
    assert_eq!(names, vec!["id", "amount", "updated_at", "note"]);

    // The column stays, but a newer row no longer carrying it nulls it
    assert_eq!(table.rows[0].get("amount"), Some(&Value::Null));
    assert_eq!(
        table.rows[0].get("note"),
        Some(&Value::String("gift wrap".into()))
    );
}
