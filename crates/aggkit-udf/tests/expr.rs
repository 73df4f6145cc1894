use std::collections::BTreeMap;

use aggkit_core::Value;
use aggkit_udf::{UdfError, compile};

fn record() -> Value {
    let mut bins = BTreeMap::new();
    bins.insert("test_id".to_string(), Value::Int(102));
    bins.insert("group_id".to_string(), Value::Int(2));
    bins.insert("name".to_string(), Value::from("bob"));
    bins.insert("ratio".to_string(), Value::Float(0.5));
    bins.insert(
        "tags".to_string(),
        Value::List(vec![Value::from("a"), Value::from("b")]),
    );
    Value::Map(bins)
}

fn eval(source: &str) -> Value {
    compile(source).unwrap().eval(&record()).unwrap()
}

#[test]
fn descriptor_filter_matches_on_equal_bin() {
    assert_eq!(
        eval("rec['test_id'] ~= nil and rec['test_id'] == 102"),
        Value::Bool(true)
    );
    assert_eq!(
        eval("rec['test_id'] ~= nil and rec['test_id'] == 103"),
        Value::Bool(false)
    );
}

#[test]
fn missing_bin_short_circuits_to_nil() {
    assert_eq!(eval("rec['missing'] ~= nil and 1"), Value::Bool(false));
    assert_eq!(eval("rec['missing']"), Value::Nil);
    assert_eq!(eval("rec['group_id'] ~= nil and 1"), Value::Int(1));
}

#[test]
fn or_returns_first_truthy_operand() {
    assert_eq!(eval("rec.missing or 'fallback'"), Value::from("fallback"));
    assert_eq!(eval("false or nil"), Value::Nil);
    assert_eq!(eval("0 or 1"), Value::Int(0));
}

#[test]
fn integer_arithmetic_stays_integral() {
    assert_eq!(eval("rec.test_id + 1"), Value::Int(103));
    assert_eq!(eval("rec.group_id * 3 - 1"), Value::Int(5));
    assert_eq!(eval("2 ^ 3"), Value::Float(8.0));
    assert_eq!(eval("10 / 4"), Value::Float(2.5));
}

#[test]
fn modulo_follows_divisor_sign() {
    assert_eq!(eval("7 % 3"), Value::Int(1));
    assert_eq!(eval("-7 % 3"), Value::Int(2));
    assert_eq!(eval("7 % -3"), Value::Int(-2));
    assert_eq!(eval("5.5 % 2"), Value::Float(1.5));
}

#[test]
fn mixed_numbers_compare_by_value() {
    assert_eq!(eval("rec.ratio < 1"), Value::Bool(true));
    assert_eq!(eval("2 == 2.0"), Value::Bool(true));
    assert_eq!(eval("'abc' < 'abd'"), Value::Bool(true));
}

#[test]
fn concatenation_renders_numbers() {
    assert_eq!(eval("rec.name .. '-' .. rec.group_id"), Value::from("bob-2"));
}

#[test]
fn lists_are_one_based() {
    assert_eq!(eval("rec.tags[1]"), Value::from("a"));
    assert_eq!(eval("rec.tags[2]"), Value::from("b"));
    assert_eq!(eval("rec.tags[3]"), Value::Nil);
    assert_eq!(eval("rec.tags[0]"), Value::Nil);
}

#[test]
fn unknown_names_are_nil() {
    assert_eq!(eval("record"), Value::Nil);
    assert_eq!(eval("not undefined"), Value::Bool(true));
}

#[test]
fn arithmetic_on_missing_bin_is_a_runtime_error() {
    let expr = compile("rec['doesnt_exist'] + 1").unwrap();
    let err = expr.eval(&record()).unwrap_err();
    match err {
        UdfError::Runtime(msg) => {
            assert!(msg.contains("arithmetic on a nil value"), "{msg}");
            assert!(msg.contains("rec['doesnt_exist'] + 1"), "{msg}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn indexing_a_scalar_fails() {
    let err = compile("rec.name.first").unwrap().eval(&record()).unwrap_err();
    assert!(matches!(err, UdfError::Runtime(msg) if msg.contains("index a string value")));
}

#[test]
fn comparing_mismatched_types_fails() {
    let err = compile("rec.name < 1").unwrap().eval(&record()).unwrap_err();
    assert!(matches!(err, UdfError::Runtime(msg) if msg.contains("compare string with number")));
}

#[test]
fn assignment_is_a_syntax_error() {
    let err = compile("rec['x'] = 1").unwrap_err();
    assert!(matches!(err, UdfError::Syntax { .. }));
}

#[test]
fn compiled_expression_keeps_its_source() {
    let expr = compile("rec.group_id").unwrap();
    assert_eq!(expr.source(), "rec.group_id");
    assert!(expr.eval(&Value::Nil).is_err());
}

#[test]
fn deeply_nested_expressions_are_syntax_errors() {
    let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
    let nots = format!("{}true", "not ".repeat(200_000));
    for source in [parens, nots] {
        let err = compile(&source).unwrap_err();
        assert!(
            matches!(&err, UdfError::Syntax { message, .. } if message.contains("nested too deeply")),
            "{err}"
        );
    }
    assert_eq!(eval(&format!("{}1{}", "(".repeat(100), ")".repeat(100))), Value::Int(1));
    assert_eq!(eval(&format!("{}true", "not ".repeat(100))), Value::Bool(true));
}
