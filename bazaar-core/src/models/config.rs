//! Market configuration.
//!
//! All knobs of the market mechanism live here: how many rounds to run, how the
//! pricing engine reacts to utilization, how currency is handed out and decayed,
//! and how the auction settles and breaks ties. Every struct has sensible
//! defaults, so a configuration file only needs to mention what it changes.

use super::Credits;
use std::time::Duration;

/// The complete configuration of a market run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MarketConfig {
    /// Total number of auction rounds before the scheduler stops
    pub rounds: u64,
    /// Pricing engine parameters
    pub pricing: PricingConfig,
    /// Currency ledger parameters
    pub currency: CurrencyConfig,
    /// Auction engine parameters
    pub auction: AuctionConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            pricing: Default::default(),
            currency: Default::default(),
            auction: Default::default(),
        }
    }
}

impl MarketConfig {
    /// Check every section, reporting the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        self.pricing.validate()?;
        self.currency.validate()?;
        self.auction.validate()
    }
}

/// Parameters of the utilization-feedback price update
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PricingConfig {
    /// Smoothing parameter α ∈ (0, 1); the fraction of the utilization error applied per round
    pub alpha: f64,
    /// Utilization above this level raises prices, below it lowers them
    pub target_utilization: f64,
    /// Lower bound of the price band
    pub min_price: f64,
    /// Upper bound of the price band
    pub max_price: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            target_utilization: 0.8,
            min_price: 0.01,
            max_price: 1000.0,
        }
    }
}

impl PricingConfig {
    /// Check the smoothing parameter, target and band
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::Alpha(self.alpha));
        }
        if !(0.0..=1.0).contains(&self.target_utilization) {
            return Err(ConfigError::TargetUtilization(self.target_utilization));
        }
        let band_ok = self.min_price.is_finite()
            && self.max_price.is_finite()
            && self.min_price > 0.0
            && self.min_price <= self.max_price;
        if !band_ok {
            return Err(ConfigError::PriceBand {
                min: self.min_price,
                max: self.max_price,
            });
        }
        Ok(())
    }

    /// Clamp a price into the band
    pub fn clamp(&self, price: f64) -> f64 {
        price.clamp(self.min_price, self.max_price)
    }
}

/// Parameters of the virtual currency
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CurrencyConfig {
    /// Balance of a new account, before applying the tenant's endowment weight
    #[cfg_attr(feature = "schemars", schemars(with = "f64"))]
    pub initial_allocation: Credits,
    /// Amount added to every balance each credit interval
    #[cfg_attr(feature = "schemars", schemars(with = "f64"))]
    pub periodic_allocation: Credits,
    /// Credit every this many rounds (0 disables periodic credit)
    pub credit_interval: u64,
    /// Factor in (0, 1] every balance is multiplied by each decay interval
    pub decay_factor: f64,
    /// Decay every this many rounds (0 disables decay)
    pub decay_interval: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            initial_allocation: Credits::from_whole(100),
            periodic_allocation: Credits::from_whole(100),
            credit_interval: 10,
            decay_factor: 0.95,
            decay_interval: 10,
        }
    }
}

impl CurrencyConfig {
    /// Check the decay factor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decay_factor > 0.0 && self.decay_factor <= 1.0 {
            Ok(())
        } else {
            Err(ConfigError::DecayFactor(self.decay_factor))
        }
    }
}

/// How winning bids are charged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SettlementPolicy {
    /// Every fill of a resource pays the posted market price
    #[default]
    Uniform,
    /// Every fill pays its own offered price
    PayAsBid,
}

/// How bids offering the same price are ordered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum TieBreak {
    /// Higher priority class first, then ascending tenant id
    #[default]
    PriorityThenTenant,
    /// Ascending tenant id only
    TenantOnly,
}

/// Parameters of the auction engine
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AuctionConfig {
    /// Simulated time between two auction rounds
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    #[cfg_attr(feature = "schemars", schemars(with = "String"))]
    pub interval: Duration,
    /// The settlement policy, fixed for the whole run
    pub settlement: SettlementPolicy,
    /// The tie-break ordering among equal bids
    pub tie_break: TieBreak,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            settlement: SettlementPolicy::default(),
            tie_break: TieBreak::default(),
        }
    }
}

impl AuctionConfig {
    /// Check the round interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            Err(ConfigError::Interval)
        } else {
            Ok(())
        }
    }
}

/// The ways in which a market configuration may be invalid
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// The run would not execute a single round
    #[error("the number of rounds must be positive")]
    NoRounds,
    /// The smoothing parameter is outside (0, 1)
    #[error("pricing alpha must lie in (0, 1), got {0}")]
    Alpha(f64),
    /// The target utilization is outside [0, 1]
    #[error("target utilization must lie in [0, 1], got {0}")]
    TargetUtilization(f64),
    /// The price band is empty, non-positive or unbounded
    #[error("invalid price band [{min}, {max}]")]
    PriceBand {
        /// Configured lower bound
        min: f64,
        /// Configured upper bound
        max: f64,
    },
    /// The decay factor is outside (0, 1]
    #[error("decay factor must lie in (0, 1], got {0}")]
    DecayFactor(f64),
    /// The auction interval is zero
    #[error("the auction interval must be positive")]
    Interval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(MarketConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_pricing() {
        let mut config = MarketConfig::default();
        config.pricing.alpha = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::Alpha(1.0)));

        let mut config = MarketConfig::default();
        config.pricing.min_price = 10.0;
        config.pricing.max_price = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PriceBand { .. })
        ));
    }

    #[test]
    fn rejects_bad_decay() {
        let mut config = MarketConfig::default();
        config.currency.decay_factor = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::DecayFactor(1.5)));
    }

    #[test]
    fn test_deserialize_partial() {
        let raw = r#"{
            "rounds": 25,
            "pricing": { "alpha": 0.5 },
            "currency": { "periodic_allocation": 12.5 },
            "auction": { "interval": "250ms", "settlement": "pay_as_bid" }
        }"#;

        let config = serde_json::from_str::<MarketConfig>(raw).unwrap();
        assert_eq!(config.rounds, 25);
        assert_eq!(config.pricing.alpha, 0.5);
        assert_eq!(config.pricing.target_utilization, 0.8);
        assert_eq!(config.currency.periodic_allocation, Credits::from_f64(12.5));
        assert_eq!(config.auction.interval, Duration::from_millis(250));
        assert_eq!(config.auction.settlement, SettlementPolicy::PayAsBid);
        assert_eq!(config.auction.tie_break, TieBreak::PriorityThenTenant);
    }
}
