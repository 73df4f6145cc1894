use aggkit_core::{Filter, Statement, Value};
use aggkit_store::{Policy, ResultSet, Store};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ExampleConfig;
use crate::error::ExampleError;

const COUNT_ALL: &str = "count(*)";

/// One output group of the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: String,
    pub filter_value: Value,
    pub group_value: Value,
    pub count: i64,
}

/// The descriptor passed to `select_agg_records`: project both bins, count
/// the group bin and all records, keep only `filter_value`, group by both
/// bins.
pub fn build_query_args(config: &ExampleConfig) -> Result<Value, ExampleError> {
    let filter_bin = &config.filter_bin;
    let group_bin = &config.group_bin;

    let document = json!({
        "fields": {
            filter_bin: filter_bin,
            group_bin: group_bin,
            format!("count({group_bin})"): {
                "func": "count",
                "expr": format!("rec['{group_bin}'] ~= nil and 1"),
            },
            COUNT_ALL: {"func": "count", "expr": "1"},
        },
        "filter": format!(
            "rec['{filter_bin}'] ~= nil and rec['{filter_bin}'] == {}",
            config.filter_value
        ),
        "group_by_fields": [filter_bin, group_bin],
    });

    let args = Value::from(document);
    // Catch a malformed descriptor here rather than on the server.
    aggkit_core::AggregateQuery::from_value(&args)?;
    Ok(args)
}

pub fn statement(config: &ExampleConfig) -> Statement {
    let mut statement = Statement::new(&config.namespace, &config.set);
    statement.set_bin_names([config.filter_bin.as_str()]);
    statement.set_filter(Filter::equal(&config.filter_bin, config.filter_value));
    statement.set_index_name(&config.index);
    statement
}

/// Run the grouped count built by [`build_query_args`] and print one line
/// per group.
pub async fn run_query(
    store: &dyn Store,
    config: &ExampleConfig,
) -> Result<Vec<GroupRow>, ExampleError> {
    let args = build_query_args(config)?;
    aggregate(store, config, args).await
}

/// Run `config.function` with `args` over the indexed statement and read
/// one [`GroupRow`] per result group.
///
/// The cursor is closed on every path out of this function.
pub async fn aggregate(
    store: &dyn Store,
    config: &ExampleConfig,
    args: Value,
) -> Result<Vec<GroupRow>, ExampleError> {
    let statement = statement(config);

    let mut cursor = store
        .query_aggregate(
            &Policy::default(),
            &statement,
            &config.package,
            &config.function,
            &[args],
        )
        .await
        .map_err(ExampleError::Query)?;
    debug!(query_id = %cursor.query_id(), "reading aggregation results");

    let rows = read_groups(&mut cursor, config).await;
    cursor.close();
    let rows = rows?;

    info!(groups = rows.len(), "aggregation complete");
    Ok(rows)
}

async fn read_groups(
    cursor: &mut ResultSet,
    config: &ExampleConfig,
) -> Result<Vec<GroupRow>, ExampleError> {
    let mut rows = Vec::new();
    while let Some(result) = cursor.next().await {
        let value = result.map_err(ExampleError::Query)?;
        let groups = value.as_map().ok_or_else(|| {
            ExampleError::UnexpectedResult(format!("expected a map, got {}", value.type_name()))
        })?;

        for (key, group) in groups {
            let row = group_row(key, group, config)?;
            println!("res: {}, {} => {}", row.filter_value, row.group_value, row.count);
            rows.push(row);
        }
    }
    Ok(rows)
}

fn group_row(key: &str, group: &Value, config: &ExampleConfig) -> Result<GroupRow, ExampleError> {
    let field = |name: &str| group.get(name).cloned().unwrap_or_default();
    let count = group
        .get(COUNT_ALL)
        .and_then(Value::as_i64)
        .ok_or_else(|| ExampleError::UnexpectedResult(format!("group {key} has no {COUNT_ALL}")))?;
    Ok(GroupRow {
        key: key.to_string(),
        filter_value: field(&config.filter_bin),
        group_value: field(&config.group_bin),
        count,
    })
}
