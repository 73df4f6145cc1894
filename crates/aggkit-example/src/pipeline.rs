use aggkit_store::Store;
use jiff::Timestamp;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ExampleConfig;
use crate::error::ExampleError;
use crate::index::{IndexOutcome, drop_index, ensure_index};
use crate::populate::{WrittenRecord, populate, truncate_set};
use crate::query::{GroupRow, run_query};
use crate::register::register_package;

/// What a run did, for printing and for checking the results.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    /// True when the store cannot run UDFs and nothing was done.
    pub skipped: bool,
    pub filter_value: i64,
    pub written: Vec<WrittenRecord>,
    pub index: Option<IndexOutcome>,
    pub groups: Vec<GroupRow>,
}

impl RunReport {
    /// Written records whose filter bin equals the queried value.
    pub fn expected_matches(&self) -> usize {
        self.written
            .iter()
            .filter(|r| r.filter_value == self.filter_value)
            .count()
    }

    /// Sum of the per-group counts returned by the query.
    pub fn grouped_total(&self) -> usize {
        self.groups
            .iter()
            .map(|g| usize::try_from(g.count).unwrap_or(0))
            .sum()
    }
}

/// Register, index, seed, query, tear down. Any error aborts the run.
pub async fn run<R: Rng>(
    store: &dyn Store,
    config: &ExampleConfig,
    rng: &mut R,
) -> Result<RunReport, ExampleError> {
    config.validate()?;
    let started_at = Timestamp::now();
    let mut report = RunReport {
        started_at,
        finished_at: started_at,
        skipped: false,
        filter_value: config.filter_value,
        written: Vec::new(),
        index: None,
        groups: Vec::new(),
    };

    if !store.supports_udf().await {
        warn!("store does not support udfs, skipping run");
        report.skipped = true;
        report.finished_at = Timestamp::now();
        return Ok(report);
    }

    info!(phase = "register", package = %config.package, "starting");
    register_package(store, config).await?;

    info!(phase = "index", index = %config.index, "starting");
    report.index = Some(ensure_index(store, config).await?);

    if config.truncate {
        info!(phase = "truncate", set = %config.set, "starting");
        truncate_set(store, config).await?;
    }

    info!(phase = "populate", records = config.record_count, "starting");
    report.written = populate(store, config, rng).await?;

    info!(phase = "query", filter_value = config.filter_value, "starting");
    report.groups = run_query(store, config).await?;

    info!(phase = "teardown", index = %config.index, "starting");
    drop_index(store, config).await?;

    report.finished_at = Timestamp::now();
    info!(
        elapsed = %report.finished_at.duration_since(report.started_at),
        groups = report.groups.len(),
        matched = report.grouped_total(),
        "run complete"
    );
    Ok(report)
}
