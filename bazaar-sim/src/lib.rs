#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod strategies;
pub use strategies::StrategyConfig;

mod cli;
pub use cli::Cli;

mod config;
pub use config::{SimConfig, TenantSpec};

mod report;
pub use report::{Reporter, RunReport, TenantReport};

use bazaar_core::models::RoundSummary;
use bazaar_market::{DeviceRegistry, Scheduler};
use tracing::{Level, event};

/// Build the market described by a configuration, admitting every tenant.
///
/// Each tenant's strategy is seeded with the run seed offset by the tenant's
/// position, so runs with the same seed bid identically.
pub fn build_market(config: &SimConfig) -> anyhow::Result<Scheduler> {
    let registry = DeviceRegistry::from_source(config)?;
    let mut scheduler = Scheduler::new(config.market.clone(), registry)?;

    for (index, spec) in config.tenants.iter().enumerate() {
        let strategy = spec.strategy.build(config.seed.wrapping_add(index as u64));
        scheduler.add_tenant(spec.tenant.clone(), strategy)?;
    }

    Ok(scheduler)
}

/// Run a market to completion on the tokio runtime.
///
/// The synchronous round loop gets a blocking thread and streams every published
/// round over a channel to a reporting task. Stopping the scheduler's
/// [`StopHandle`](bazaar_market::StopHandle) ends the run at the next round
/// boundary; the rounds already published still make it into the report.
pub async fn drive(mut scheduler: Scheduler, config: &SimConfig) -> anyhow::Result<RunReport> {
    let devices = scheduler.registry().list_devices().to_vec();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    scheduler.subscribe(Box::new(move |summary: &RoundSummary| {
        let _ = tx.send(summary.clone());
    }));

    let mut reporter = Reporter::new(config.market.auction.settlement);
    let report_task = tokio::spawn(async move {
        while let Some(summary) = rx.recv().await {
            reporter.record(&summary);
        }
        reporter
    });

    // Dropping the scheduler at the end closes the channel and lets the reporter finish
    let rounds = tokio::task::spawn_blocking(move || scheduler.run()).await??;
    event!(Level::INFO, rounds, "simulation finished");

    Ok(report_task.await?.finish(&devices, config.cost_per_kwh))
}
