use aggkit_core::{
    AggregateExpr, AggregateFunc, AggregateQuery, Bin, CoreError, FieldSpec, Filter, Key, Value,
};

#[test]
fn builder_produces_wire_shape() {
    let query = AggregateQuery::new()
        .field("test_id")
        .field("group_id")
        .aggregate("count(*)", AggregateFunc::Count, "1")
        .filter("rec['test_id'] == 102")
        .group_by(["test_id", "group_id"]);

    let value = query.to_value().unwrap();

    assert_eq!(
        value.to_json(),
        serde_json::json!({
            "fields": {
                "test_id": "test_id",
                "group_id": "group_id",
                "count(*)": {"func": "count", "expr": "1"}
            },
            "filter": "rec['test_id'] == 102",
            "group_by_fields": ["test_id", "group_id"]
        })
    );
    assert_eq!(AggregateQuery::from_value(&value).unwrap(), query);
}

#[test]
fn parses_descriptor_without_filter_or_grouping() {
    let query = AggregateQuery::from_json_str(
        r#"{"fields": {"sum(age)": {"func": "sum", "expr": "rec['age']"}}}"#,
    )
    .unwrap();

    assert_eq!(query.filter, None);
    assert!(query.group_by_fields.is_empty());
    assert_eq!(
        query.fields.get("sum(age)"),
        Some(&FieldSpec::Aggregate(AggregateExpr {
            func: AggregateFunc::Sum,
            expr: "rec['age']".to_string(),
        }))
    );
}

#[test]
fn rejects_unknown_function() {
    let err = AggregateQuery::from_json_str(
        r#"{"fields": {"avg(age)": {"func": "avg", "expr": "rec['age']"}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Serialization(_)));
}

#[test]
fn rejects_empty_descriptor() {
    let err = AggregateQuery::from_json_str(r#"{"fields": {}}"#).unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuery(_)));
}

#[test]
fn rejects_blank_expression() {
    let err = AggregateQuery::new()
        .aggregate("count(*)", AggregateFunc::Count, "  ")
        .validate()
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuery(_)));
}

#[test]
fn equality_filter_compares_numbers_by_value() {
    let filter = Filter::equal("test_id", 102);
    assert!(filter.matches(&Value::Int(102)));
    assert!(filter.matches(&Value::Float(102.0)));
    assert!(!filter.matches(&Value::Int(103)));
    assert!(!filter.matches(&Value::from("102")));
    assert_eq!(filter.bin_name(), "test_id");
}

#[test]
fn range_filter_is_inclusive() {
    let filter = Filter::range("age", 20, 30);
    assert!(filter.matches(&Value::Int(20)));
    assert!(filter.matches(&Value::Int(30)));
    assert!(!filter.matches(&Value::Int(31)));
    assert!(!filter.matches(&Value::Nil));
}

#[test]
fn bin_names_are_limited() {
    assert!(Bin::validate_name("group_id").is_ok());
    assert!(Bin::validate_name("").is_err());
    assert!(Bin::validate_name("a_very_long_bin_name").is_err());
}

#[test]
fn key_display_includes_namespace_and_set() {
    let key = Key::new("test", "demoset", "aggkey7");
    assert_eq!(key.to_string(), "test:demoset:aggkey7");
    assert!(key.in_set("test", "demoset"));
    assert!(!key.in_set("test", "other"));
}
