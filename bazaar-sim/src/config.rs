//! Simulation configuration management.
//!
//! This module handles loading and merging configuration from multiple sources
//! with a clear precedence order. Configuration can come from default values,
//! configuration files, and environment variables.

use crate::{Cli, StrategyConfig, strategies::BackpressureConfig};
use bazaar_core::{
    models::{Device, DeviceDto, DeviceError, MarketConfig, PriorityClass, Tenant},
    ports::DeviceSource,
};
use serde::{Deserialize, Serialize};

/// A simulated tenant: who it is and how it bids
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct TenantSpec {
    /// The tenant's identity, priority and endowment weight
    #[serde(flatten)]
    pub tenant: Tenant,
    /// The tenant's bidding strategy
    pub strategy: StrategyConfig,
}

/// The complete configuration of a simulation run
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct SimConfig {
    /// Market mechanism parameters
    pub market: MarketConfig,

    /// The device pool
    pub devices: Vec<DeviceDto>,

    /// The participating tenants
    pub tenants: Vec<TenantSpec>,

    /// Seed for the tenants' random number generators
    pub seed: u64,

    /// Electricity price used to report the energy cost of the pool
    pub cost_per_kwh: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let device = |id: &str, category: &str, cpu: f64, memory: f64, watts: f64, scale: f64| {
            DeviceDto {
                id: id.into(),
                category: category.to_owned(),
                capacity: [
                    ("cpu".into(), cpu),
                    ("memory".into(), memory),
                    ("network".into(), cpu / 2.0),
                ]
                .into_iter()
                .collect(),
                base_price: [
                    ("cpu".into(), 1.0 * scale),
                    ("memory".into(), 0.25 * scale),
                    ("network".into(), 0.5 * scale),
                ]
                .into_iter()
                .collect(),
                power_draw: watts,
            }
        };

        let tenant = |id: &str, priority: PriorityClass, weight: f64, strategy: StrategyConfig| {
            TenantSpec {
                tenant: Tenant::new(id, priority).with_weight(weight),
                strategy,
            }
        };

        Self {
            market: MarketConfig::default(),
            devices: vec![
                device("edge-1", "edge", 4.0, 8.0, 15.0, 1.2),
                device("edge-2", "edge", 4.0, 8.0, 15.0, 1.2),
                device("cloud-1", "cloud", 32.0, 128.0, 350.0, 0.8),
            ],
            tenants: vec![
                tenant(
                    "tenant_1",
                    PriorityClass::High,
                    1.5,
                    StrategyConfig::Backpressure(BackpressureConfig::default()),
                ),
                tenant(
                    "tenant_2",
                    PriorityClass::Medium,
                    1.0,
                    StrategyConfig::MarketFollower {
                        bundle: [("cpu".into(), 8.0), ("memory".into(), 16.0)]
                            .into_iter()
                            .collect(),
                        markup: 0.1,
                    },
                ),
                tenant(
                    "tenant_3",
                    PriorityClass::Low,
                    0.8,
                    StrategyConfig::Fixed {
                        bundle: [("cpu".into(), 4.0), ("network".into(), 2.0)]
                            .into_iter()
                            .collect(),
                        prices: [("cpu".into(), 1.5), ("network".into(), 0.75)]
                            .into_iter()
                            .collect(),
                    },
                ),
            ],
            seed: 0,
            cost_per_kwh: 0.15,
        }
    }
}

impl SimConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Command-line overrides (highest priority)
    /// 2. Environment variables
    /// 3. Config file given by the CLI
    /// 4. Default values (lowest priority)
    ///
    /// Environment variables are mapped using the pattern:
    /// `BAZAAR_<SECTION>__<KEY>` maps to `<section>.<key>`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Run for 500 rounds
    /// export BAZAAR_MARKET__ROUNDS=500
    ///
    /// # Charge every fill its own offered price
    /// export BAZAAR_MARKET__AUCTION__SETTLEMENT=pay_as_bid
    ///
    /// # Decay balances every 20 rounds
    /// export BAZAAR_MARKET__CURRENCY__DECAY_INTERVAL=20
    /// ```
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Start with default values
        config = config.add_source(config::Config::try_from(&Self::default())?);

        // Layer on config file if it is specified and exists
        if let Some(path) = &cli.config {
            if path.exists() {
                config = config.add_source(config::File::from(path.as_path()))
            } else {
                return Err(anyhow::anyhow!(
                    "Config file {} does not exist",
                    path.display()
                ));
            }
        }

        // Override with environment variables
        // This maps BAZAAR_MARKET__ROUNDS to market.rounds
        config = config.add_source(
            config::Environment::with_prefix("BAZAAR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: Self = config.build()?.try_deserialize()?;

        if let Some(rounds) = cli.rounds {
            loaded.market.rounds = rounds;
        }
        if let Some(seed) = cli.seed {
            loaded.seed = seed;
        }

        loaded.market.validate()?;
        Ok(loaded)
    }
}

impl DeviceSource for SimConfig {
    type Error = DeviceError;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        self.devices.iter().cloned().map(Device::new).collect()
    }
}
