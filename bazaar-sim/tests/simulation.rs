use approx::assert_relative_eq;
use bazaar_core::models::{SettlementPolicy, TenantId};
use bazaar_sim::{Cli, Reporter, RunReport, SimConfig, build_market, drive};
use rstest::*;
use std::{io::Write as _, path::PathBuf, time::Duration};

fn short_run() -> SimConfig {
    let mut config = SimConfig::default();
    config.market.rounds = 30;
    config.seed = 11;
    config
}

#[fixture]
fn config() -> SimConfig {
    short_run()
}

fn simulate(config: &SimConfig) -> RunReport {
    let mut scheduler = build_market(config).unwrap();
    let mut reporter = Reporter::new(config.market.auction.settlement);
    while let Some(summary) = scheduler.step().unwrap() {
        reporter.record(&summary);
    }
    reporter.finish(scheduler.registry().list_devices(), config.cost_per_kwh)
}

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("bazaar-sim-{}-{name}", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn defaults_are_loadable() {
    let config = SimConfig::load(&Cli::default()).unwrap();
    assert_eq!(config.devices.len(), 3);
    assert_eq!(config.tenants.len(), 3);
    assert_eq!(config.tenants[0].tenant.id, TenantId::from("tenant_1"));
    assert_eq!(config.tenants[0].tenant.weight, 1.5);
}

#[test]
fn file_overrides_defaults() {
    let path = write_config(
        "override.toml",
        r#"
seed = 7

[market]
rounds = 12

[market.auction]
settlement = "pay_as_bid"
interval = "500ms"
"#,
    );

    let cli = Cli {
        config: Some(path.clone()),
        ..Default::default()
    };
    let config = SimConfig::load(&cli).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(config.seed, 7);
    assert_eq!(config.market.rounds, 12);
    assert_eq!(config.market.auction.settlement, SettlementPolicy::PayAsBid);
    assert_eq!(config.market.auction.interval, Duration::from_millis(500));
    assert_eq!(config.market.pricing.alpha, 0.3);
    assert_eq!(config.devices.len(), 3);
}

#[test]
fn command_line_wins() {
    let cli = Cli {
        rounds: Some(3),
        seed: Some(99),
        ..Default::default()
    };
    let config = SimConfig::load(&cli).unwrap();
    assert_eq!(config.market.rounds, 3);
    assert_eq!(config.seed, 99);
}

#[test]
fn missing_file_is_an_error() {
    let cli = Cli {
        config: Some(PathBuf::from("/definitely/not/here.toml")),
        ..Default::default()
    };
    assert!(SimConfig::load(&cli).is_err());
}

#[test]
fn invalid_market_is_rejected() {
    let path = write_config("invalid.toml", "[market.pricing]\nalpha = 2.0\n");
    let cli = Cli {
        config: Some(path.clone()),
        ..Default::default()
    };
    let result = SimConfig::load(&cli);
    std::fs::remove_file(path).unwrap();
    assert!(result.is_err());
}

#[rstest]
fn invalid_device_is_rejected(mut config: SimConfig) {
    config.devices[0].capacity.insert("cpu".into(), -1.0);
    assert!(build_market(&config).is_err());
}

#[rstest]
fn runs_to_completion(config: SimConfig) {
    let report = simulate(&config);

    assert_eq!(report.rounds, 30);
    assert_eq!(report.elapsed, Duration::from_secs(30));
    assert_eq!(report.tenants.len(), 3);
    assert_eq!(report.malformed_bids, 0);
    assert!(
        report
            .mean_utilization
            .values()
            .all(|&u| (0.0..=1.0).contains(&u))
    );

    // 380 W for 30 s at 0.15 per kWh
    assert_relative_eq!(
        report.energy_cost,
        380.0 * (30.0 / 3600.0) / 1000.0 * 0.15,
        max_relative = 1e-9
    );
}

#[rstest]
fn runs_are_reproducible(config: SimConfig) {
    assert_eq!(simulate(&config), simulate(&config));
}

#[tokio::test]
async fn driver_reports_every_round() {
    let config = short_run();
    let report = drive(build_market(&config).unwrap(), &config)
        .await
        .unwrap();
    assert_eq!(report, simulate(&config));
}

#[tokio::test]
async fn stopped_driver_runs_nothing() {
    let config = short_run();
    let scheduler = build_market(&config).unwrap();
    scheduler.stop_handle().stop();

    let report = drive(scheduler, &config).await.unwrap();
    assert_eq!(report.rounds, 0);
    assert_eq!(report.elapsed, Duration::ZERO);
    assert_eq!(report.energy_cost, 0.0);
}
