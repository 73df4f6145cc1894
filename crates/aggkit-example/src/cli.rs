use std::path::PathBuf;

use clap::Parser;

use crate::config::ExampleConfig;

/// Register an aggregation UDF, index and seed a set, then run a grouped
/// aggregation query against it.
#[derive(Debug, Parser)]
#[command(name = "aggkit-example")]
#[command(version)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Config file (defaults to <config dir>/aggkit/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "AGGKIT_NAMESPACE")]
    pub namespace: Option<String>,

    #[arg(short, long, env = "AGGKIT_SET")]
    pub set: Option<String>,

    /// Directory holding the Lua package
    #[arg(long, env = "AGGKIT_UDF_DIR")]
    pub udf_dir: Option<PathBuf>,

    /// Number of records to write
    #[arg(short, long, env = "AGGKIT_RECORDS")]
    pub records: Option<usize>,

    /// Seed for the record generator
    #[arg(long, env = "AGGKIT_SEED")]
    pub seed: Option<u64>,

    /// Simulated store nodes
    #[arg(long, env = "AGGKIT_NODES")]
    pub nodes: Option<usize>,

    /// Value of the filter bin to aggregate over
    #[arg(long)]
    pub filter_value: Option<i64>,

    /// Truncate the set before writing
    #[arg(long)]
    pub truncate: bool,
}

impl Cli {
    /// Overlay flags (and their environment variables) onto `config`.
    pub fn apply(&self, config: &mut ExampleConfig) {
        if let Some(namespace) = &self.namespace {
            config.namespace.clone_from(namespace);
        }
        if let Some(set) = &self.set {
            config.set.clone_from(set);
        }
        if let Some(udf_dir) = &self.udf_dir {
            config.udf_dir.clone_from(udf_dir);
        }
        if let Some(records) = self.records {
            config.record_count = records;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(nodes) = self.nodes {
            config.nodes = nodes;
        }
        if let Some(filter_value) = self.filter_value {
            config.filter_value = filter_value;
        }
        if self.truncate {
            config.truncate = true;
        }
    }
}
