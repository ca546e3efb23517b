use bazaar_sim::{Cli, SimConfig, build_market, drive};
use std::fs::File;
use tracing::{Level, event};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log filtering follows RUST_LOG
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::import()?;

    // If requested, dump the schema and exit.
    if let Some(path) = &cli.schema {
        let schema = schemars::schema_for!(SimConfig);
        serde_json::to_writer_pretty(File::create(path)?, &schema)?;
        return Ok(());
    }

    let config = SimConfig::load(&cli)?;
    let scheduler = build_market(&config)?;

    // Ctrl-C stops the market at the next round boundary
    let stop = scheduler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            event!(Level::WARN, "interrupted, stopping after the current round");
            stop.stop();
        }
    });

    let report = drive(scheduler, &config).await?;

    match &cli.output {
        Some(path) => serde_json::to_writer_pretty(File::create(path)?, &report)?,
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
