use std::path::PathBuf;
use std::time::Duration;

use aggkit_core::{AggregateQuery, FieldSpec, IndexType, Value};
use aggkit_example::index::{IndexOutcome, drop_index, ensure_index};
use aggkit_example::populate::populate;
use aggkit_example::query::{aggregate, build_query_args, run_query, statement};
use aggkit_example::register::register_package;
use aggkit_example::{ExampleConfig, ExampleError, run};
use aggkit_store::{IndexState, MemoryConfig, MemoryStore, Policy, ResultCode, Store};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

fn udf_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("udf")
}

fn config() -> ExampleConfig {
    ExampleConfig {
        udf_dir: udf_dir(),
        seed: Some(7),
        ..ExampleConfig::default()
    }
}

fn store(nodes: usize) -> MemoryStore {
    MemoryStore::new(MemoryConfig {
        nodes,
        ..MemoryConfig::default()
    })
}

#[tokio::test]
async fn hundred_records_grouped_by_second_bin() {
    let config = config();
    let store = store(config.nodes);
    let mut rng = StdRng::seed_from_u64(7);

    let report = run(&store, &config, &mut rng).await.unwrap();

    assert!(!report.skipped);
    assert_eq!(report.index, Some(IndexOutcome::Created));
    assert_eq!(report.written.len(), 100);
    assert!(report.written.iter().all(|r| (100..=105).contains(&r.filter_value)));
    assert!(report.written.iter().all(|r| (1..=3).contains(&r.group_value)));

    assert!(report.expected_matches() > 0);
    assert_eq!(report.grouped_total(), report.expected_matches());
    assert!(report.groups.len() <= 3);
    for group in &report.groups {
        assert_eq!(group.filter_value, Value::Int(102));
        let g = group.group_value.as_i64().unwrap();
        assert!((1..=3).contains(&g));
        assert_eq!(group.key, format!("102|{g}"));
        let expected = report
            .written
            .iter()
            .filter(|r| r.filter_value == 102 && r.group_value == g)
            .count();
        assert_eq!(group.count, expected as i64);
    }
    assert!(report.finished_at >= report.started_at);

    let stats = store.stats().await;
    assert_eq!(stats.indexes, 0);
    assert_eq!(stats.records, 100);
    assert_eq!(stats.packages, 1);
    assert_eq!(stats.cursors_opened, 1);
    assert_eq!(stats.cursors_closed, 1);
}

#[tokio::test]
async fn same_seed_gives_same_run() {
    let config = config();
    let first = run(&store(1), &config, &mut StdRng::seed_from_u64(42)).await.unwrap();
    let second = run(&store(4), &config, &mut StdRng::seed_from_u64(42)).await.unwrap();
    assert_eq!(first.written, second.written);
    assert_eq!(first.groups, second.groups);
}

#[tokio::test]
async fn ensure_index_is_idempotent() {
    let config = config();
    let store = store(2);

    assert_eq!(ensure_index(&store, &config).await.unwrap(), IndexOutcome::Created);
    assert_eq!(
        ensure_index(&store, &config).await.unwrap(),
        IndexOutcome::AlreadyExisted
    );
    assert_eq!(store.stats().await.indexes, 1);

    drop_index(&store, &config).await.unwrap();
    let err = drop_index(&store, &config).await.unwrap_err();
    assert_eq!(
        err.store_error().map(|e| e.result_code()),
        Some(ResultCode::IndexNotFound)
    );
}

#[tokio::test]
async fn ensure_index_waits_for_an_index_still_building() {
    let config = config();
    let store = MemoryStore::new(MemoryConfig {
        index_build_delay: Duration::from_millis(200),
        ..MemoryConfig::default()
    });
    let _building = store
        .create_index(
            &Policy::no_timeout(),
            &config.namespace,
            &config.set,
            &config.index,
            &config.filter_bin,
            IndexType::Numeric,
        )
        .await
        .unwrap();

    assert_eq!(
        ensure_index(&store, &config).await.unwrap(),
        IndexOutcome::AlreadyExisted
    );
    let status = store
        .index_status(&Policy::default(), &config.namespace, &config.index)
        .await
        .unwrap();
    assert_eq!(status, Some(IndexState::Ready));
}

#[tokio::test]
async fn bin_indexed_under_another_name_is_an_error() {
    let config = config();
    let store = store(2);
    let mut task = store
        .create_index(
            &Policy::no_timeout(),
            &config.namespace,
            &config.set,
            "otherindex",
            &config.filter_bin,
            IndexType::Numeric,
        )
        .await
        .unwrap();
    task.wait_till_complete().await.unwrap();

    let err = ensure_index(&store, &config).await.unwrap_err();
    assert!(matches!(err, ExampleError::Index(ref e) if e.is_index_already_exists()));
}

#[tokio::test]
async fn run_is_skipped_without_udf_support() {
    let store = MemoryStore::new(MemoryConfig {
        supports_udf: false,
        ..MemoryConfig::default()
    });
    let report = run(&store, &config(), &mut StdRng::seed_from_u64(1))
        .await
        .unwrap();

    assert!(report.skipped);
    assert!(report.written.is_empty());
    assert_eq!(store.stats().await.records, 0);
}

#[tokio::test]
async fn missing_package_file_fails_registration() {
    let config = ExampleConfig {
        udf_dir: PathBuf::from("/nonexistent/aggkit/udf"),
        ..config()
    };
    let err = register_package(&store(2), &config).await.unwrap_err();
    assert!(matches!(err, ExampleError::ReadPackage { .. }));
}

#[tokio::test]
async fn query_without_index_fails_before_opening_a_cursor() {
    let config = config();
    let store = store(2);
    register_package(&store, &config).await.unwrap();
    populate(&store, &config, &mut StdRng::seed_from_u64(3)).await.unwrap();

    let err = run_query(&store, &config).await.unwrap_err();
    assert!(matches!(err, ExampleError::Query(ref e) if e.is_index_not_found()));

    let stats = store.stats().await;
    assert_eq!(stats.cursors_opened, 0);
    assert_eq!(stats.cursors_closed, 0);
}

#[tokio::test]
async fn failing_aggregation_still_closes_its_cursor() {
    let config = config();
    let store = store(2);
    register_package(&store, &config).await.unwrap();
    ensure_index(&store, &config).await.unwrap();
    let written = populate(&store, &config, &mut StdRng::seed_from_u64(7)).await.unwrap();
    assert!(written.iter().any(|r| r.filter_value == config.filter_value));

    // Arithmetic on a missing bin fails on every node that sees a match.
    let args = Value::from(json!({
        "fields": {
            "count(*)": {"func": "count", "expr": "1"},
            "broken": {"func": "sum", "expr": "rec['test_id'] + rec['doesnt_exist']"},
        },
        "group_by_fields": ["group_id"],
    }));
    let err = aggregate(&store, &config, args).await.unwrap_err();

    assert!(matches!(
        err,
        ExampleError::Query(ref e) if e.result_code() == ResultCode::UdfBadResponse
    ));
    let stats = store.stats().await;
    assert_eq!(stats.cursors_opened, 1);
    assert_eq!(stats.cursors_closed, 1);
}

#[tokio::test]
async fn query_with_no_matches_prints_nothing_and_closes() {
    let config = ExampleConfig {
        filter_value: 105,
        filter_range: (100, 105),
        ..config()
    };
    let store = store(2);
    register_package(&store, &config).await.unwrap();
    ensure_index(&store, &config).await.unwrap();

    // No records written at all.
    let rows = run_query(&store, &config).await.unwrap();
    assert!(rows.is_empty());

    let stats = store.stats().await;
    assert_eq!(stats.cursors_opened, 1);
    assert_eq!(stats.cursors_closed, 1);
}

#[tokio::test]
async fn truncate_flag_clears_earlier_records() {
    let store = store(2);
    let first = ExampleConfig {
        key_prefix: "old".into(),
        ..config()
    };
    run(&store, &first, &mut StdRng::seed_from_u64(5)).await.unwrap();

    let second = ExampleConfig {
        key_prefix: "new".into(),
        record_count: 30,
        truncate: true,
        ..config()
    };
    let report = run(&store, &second, &mut StdRng::seed_from_u64(6)).await.unwrap();

    assert_eq!(store.stats().await.records, 30);
    assert_eq!(report.grouped_total(), report.expected_matches());
}

#[test]
fn query_args_describe_the_grouped_count() {
    let args = build_query_args(&config()).unwrap();
    let query = AggregateQuery::from_value(&args).unwrap();

    assert_eq!(
        query.filter.as_deref(),
        Some("rec['test_id'] ~= nil and rec['test_id'] == 102")
    );
    assert_eq!(query.group_by_fields, vec!["test_id", "group_id"]);
    assert_eq!(query.fields["test_id"], FieldSpec::Bin("test_id".into()));
    assert_eq!(query.fields["group_id"], FieldSpec::Bin("group_id".into()));
    assert!(matches!(
        &query.fields["count(group_id)"],
        FieldSpec::Aggregate(agg) if agg.expr == "rec['group_id'] ~= nil and 1"
    ));
    assert!(matches!(
        &query.fields["count(*)"],
        FieldSpec::Aggregate(agg) if agg.expr == "1"
    ));
}

#[test]
fn statement_narrows_through_the_index() {
    let statement = statement(&config());
    assert_eq!(statement.bin_names, vec!["test_id"]);
    assert_eq!(statement.index_name.as_deref(), Some("aggindex"));
    assert_eq!(
        statement.filter,
        Some(aggkit_core::Filter::equal("test_id", 102_i64))
    );
}
