use aggkit_example::cli::Cli;
use aggkit_example::{ExampleConfig, pipeline};
use aggkit_store::{MemoryConfig, MemoryStore};
use clap::Parser;
use eyre::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    if cli.json_logs {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = ExampleConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let store = MemoryStore::new(MemoryConfig {
        nodes: config.nodes,
        ..MemoryConfig::default()
    });
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = pipeline::run(&store, &config, &mut rng).await?;
    if report.skipped {
        println!("SKIPPED: store does not support udfs");
        return Ok(());
    }

    tracing::debug!(stats = ?store.stats().await, "store stats");
    println!(
        "DONE! {} groups, {} records matched",
        report.groups.len(),
        report.grouped_total()
    );
    Ok(())
}
