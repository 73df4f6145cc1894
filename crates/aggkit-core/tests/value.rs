use std::collections::BTreeMap;

use aggkit_core::Value;
use serde_json::json;

#[test]
fn nested_document_decodes_into_maps_and_lists() {
    let doc = json!({
        "fields": {
            "test_id": "test_id",
            "count(*)": {"func": "count", "expr": "1"}
        },
        "group_by_fields": ["test_id", "group_id"],
        "limit": 10,
        "ratio": 0.5,
        "enabled": true,
        "note": null
    });

    let value = Value::from(doc);

    let fields = value.get("fields").and_then(Value::as_map).unwrap();
    assert_eq!(fields.get("test_id"), Some(&Value::from("test_id")));
    assert_eq!(
        fields.get("count(*)").and_then(|v| v.get("func")),
        Some(&Value::from("count"))
    );
    assert_eq!(
        value.get("group_by_fields"),
        Some(&Value::from(vec!["test_id", "group_id"]))
    );
    assert_eq!(value.get("limit"), Some(&Value::Int(10)));
    assert_eq!(value.get("ratio"), Some(&Value::Float(0.5)));
    assert_eq!(value.get("enabled"), Some(&Value::Bool(true)));
    assert_eq!(value.get("note"), Some(&Value::Nil));
}

#[test]
fn json_rendering_drops_non_finite_floats() {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Value::Float(f64::NAN));
    map.insert("b".to_string(), Value::Int(3));

    assert_eq!(Value::Map(map).to_json(), json!({"a": null, "b": 3}));
}

#[test]
fn lua_truthiness() {
    assert!(!Value::Nil.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
}

#[test]
fn integral_floats_convert_to_i64() {
    assert_eq!(Value::Float(102.0).as_i64(), Some(102));
    assert_eq!(Value::Float(102.5).as_i64(), None);
    assert_eq!(Value::from("102").as_i64(), None);
}

#[test]
fn display_is_flat_and_unquoted() {
    let value = Value::from(serde_json::json!({"b": [1, "x"], "a": 2.5}));
    assert_eq!(value.to_string(), "{a: 2.5, b: [1, x]}");
    assert_eq!(Value::Nil.to_string(), "nil");
    assert_eq!(Value::Float(3.0).to_string(), "3");
}

#[test]
fn serde_goes_through_json() {
    let value: Value = serde_json::from_str(r#"{"x": [1, 2.5, "s", null]}"#).unwrap();
    let back = serde_json::to_string(&value).unwrap();
    assert_eq!(back, r#"{"x":[1,2.5,"s",null]}"#);
}
