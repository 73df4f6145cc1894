use std::io::Write;
use std::path::PathBuf;

use aggkit_example::cli::Cli;
use aggkit_example::config::CURRENT_VERSION;
use aggkit_example::{ExampleConfig, ExampleError};
use clap::Parser;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_are_valid() {
    let config = ExampleConfig::default();
    config.validate().unwrap();
    assert_eq!(config.package_path(), PathBuf::from("udf/aggAPI.lua"));
    assert_eq!(config.function, "select_agg_records");
}

#[test]
fn partial_file_fills_in_defaults() {
    let file = write_config(r#"{"namespace": "bar", "record_count": 10}"#);
    let config = ExampleConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.namespace, "bar");
    assert_eq!(config.record_count, 10);
    assert_eq!(config.set, "demoset");
    assert_eq!(config.config_version, CURRENT_VERSION);
}

#[test]
fn newer_config_version_is_rejected() {
    let file = write_config(r#"{"config_version": 99}"#);
    let err = ExampleConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ExampleError::Config(msg) if msg.contains("99")));
}

#[test]
fn malformed_file_is_a_serialization_error() {
    let file = write_config("{ not json");
    let err = ExampleConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ExampleError::Serialization(_)));
}

#[test]
fn missing_explicit_file_is_a_config_error() {
    let err = ExampleConfig::load(Some(std::path::Path::new("/nonexistent/aggkit.json"))).unwrap_err();
    assert!(matches!(err, ExampleError::Config(_)));
}

#[test]
fn validate_rejects_bad_settings() {
    let cases = [
        ExampleConfig {
            namespace: String::new(),
            ..ExampleConfig::default()
        },
        ExampleConfig {
            record_count: 0,
            ..ExampleConfig::default()
        },
        ExampleConfig {
            nodes: 0,
            ..ExampleConfig::default()
        },
        ExampleConfig {
            group_range: (3, 1),
            ..ExampleConfig::default()
        },
        ExampleConfig {
            filter_value: 99,
            ..ExampleConfig::default()
        },
        ExampleConfig {
            group_bin: "a_bin_name_far_too_long".into(),
            ..ExampleConfig::default()
        },
    ];
    for config in cases {
        assert!(
            matches!(config.validate(), Err(ExampleError::Config(_))),
            "{config:?} should not validate"
        );
    }
}

#[test]
fn flags_override_file_values() {
    let file = write_config(r#"{"namespace": "bar", "set": "fromfile", "nodes": 3}"#);
    let mut config = ExampleConfig::load(Some(file.path())).unwrap();

    let cli = Cli::try_parse_from([
        "aggkit-example",
        "-vv",
        "--set",
        "fromflag",
        "--records",
        "25",
        "--seed",
        "9",
        "--filter-value",
        "104",
        "--truncate",
    ])
    .unwrap();
    cli.apply(&mut config);

    assert_eq!(cli.verbose, 2);
    assert_eq!(config.namespace, "bar");
    assert_eq!(config.set, "fromflag");
    assert_eq!(config.nodes, 3);
    assert_eq!(config.record_count, 25);
    assert_eq!(config.seed, Some(9));
    assert_eq!(config.filter_value, 104);
    assert!(config.truncate);
    config.validate().unwrap();
}
