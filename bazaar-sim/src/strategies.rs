//! Bidding strategies for simulated tenants.
//!
//! Each tenant in the configuration names one of the strategies below. They are
//! deliberately simple: the market mechanism is the thing under study, and the
//! strategies only need to produce plausible, reproducible demand.

use bazaar_core::{
    models::{Demand, Prices, Quantities, Tenant},
    ports::{BiddingStrategy, RoundContext},
};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// The configured strategy of a tenant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Request the same bundle at the same unit prices every round
    Fixed {
        /// Quantity requested per resource type
        bundle: Quantities,
        /// Offered unit price per resource type
        prices: Prices,
    },
    /// Request the same bundle, offering the posted price plus a markup
    MarketFollower {
        /// Quantity requested per resource type
        bundle: Quantities,
        /// Fraction added on top of the posted price
        #[serde(default)]
        markup: f64,
    },
    /// Stream-operator demand driven by input rate and upstream backpressure
    Backpressure(BackpressureConfig),
}

impl StrategyConfig {
    /// Instantiate the strategy; `seed` makes any randomness reproducible
    pub fn build(&self, seed: u64) -> Box<dyn BiddingStrategy> {
        match self {
            Self::Fixed { bundle, prices } => Box::new(Fixed {
                bundle: bundle.clone(),
                prices: prices.clone(),
            }),
            Self::MarketFollower { bundle, markup } => Box::new(MarketFollower {
                bundle: bundle.clone(),
                markup: *markup,
            }),
            Self::Backpressure(config) => Box::new(Backpressure::new(config.clone(), seed)),
        }
    }
}

/// Parameters of the backpressure strategy.
///
/// Each round the operator observes an input rate `r`, drawn uniformly from
/// `[min_rate, max_rate]`, and requests
/// `base · (1 + complexity · r / reference_rate)` of every resource, offering the
/// posted price scaled by the urgency `exp(sensitivity · queue / max_queue)`.
///
/// The upstream queue grows by `queue_step · r / reference_rate` scaled by the
/// unserved fraction of the previous request, and drains by `queue_step` scaled by
/// the served fraction. It is kept within `[0, max_queue]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct BackpressureConfig {
    /// Base requirement per resource type
    pub base: Quantities,
    /// Sensitivity of the requirement to the input rate, typically in (0, 1)
    pub complexity: f64,
    /// The input rate at which the requirement is `base · (1 + complexity)`
    pub reference_rate: f64,
    /// Lower bound of the observed input rate
    pub min_rate: f64,
    /// Upper bound of the observed input rate
    pub max_rate: f64,
    /// How strongly a full queue raises the offered price
    pub sensitivity: f64,
    /// Queue capacity
    pub max_queue: f64,
    /// Queue length at the start of the run
    pub initial_queue: f64,
    /// Queue growth or drain per round at the reference rate
    pub queue_step: f64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            base: [("cpu".into(), 2.0), ("memory".into(), 4.0)]
                .into_iter()
                .collect(),
            complexity: 0.5,
            reference_rate: 500.0,
            min_rate: 100.0,
            max_rate: 1000.0,
            sensitivity: 2.0,
            max_queue: 200.0,
            initial_queue: 0.0,
            queue_step: 20.0,
        }
    }
}

struct Fixed {
    bundle: Quantities,
    prices: Prices,
}

impl BiddingStrategy for Fixed {
    fn bid(&mut self, _: &Tenant, _: &RoundContext<'_>) -> Vec<Demand> {
        self.bundle
            .iter()
            .filter_map(|(resource, &quantity)| {
                let price = *self.prices.get(resource)?;
                Some(Demand {
                    resource: resource.clone(),
                    quantity,
                    price,
                })
            })
            .collect()
    }
}

struct MarketFollower {
    bundle: Quantities,
    markup: f64,
}

impl BiddingStrategy for MarketFollower {
    fn bid(&mut self, _: &Tenant, context: &RoundContext<'_>) -> Vec<Demand> {
        self.bundle
            .iter()
            .filter_map(|(resource, &quantity)| {
                let price = context.price(resource)? * (1.0 + self.markup);
                Some(Demand {
                    resource: resource.clone(),
                    quantity,
                    price,
                })
            })
            .collect()
    }
}

struct Backpressure {
    config: BackpressureConfig,
    rng: StdRng,
    queue: f64,
    last_ratio: f64,
    last_request: Quantities,
}

impl Backpressure {
    fn new(config: BackpressureConfig, seed: u64) -> Self {
        let queue = config.initial_queue.clamp(0.0, config.max_queue.max(0.0));
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            queue,
            last_ratio: 1.0,
            last_request: Quantities::default(),
        }
    }

    fn rate_ratio(&mut self) -> f64 {
        let BackpressureConfig {
            min_rate,
            max_rate,
            reference_rate,
            ..
        } = self.config;
        let rate = if min_rate < max_rate {
            self.rng.random_range(min_rate..max_rate)
        } else {
            min_rate
        };
        if reference_rate > 0.0 {
            rate / reference_rate
        } else {
            1.0
        }
    }

    // Fraction of the previous request that was granted, averaged over resources
    fn served(&self, context: &RoundContext<'_>) -> f64 {
        let fractions = self
            .last_request
            .iter()
            .filter(|(_, requested)| **requested > 0.0)
            .map(|(resource, &requested)| {
                (context.last_granted(resource) / requested).clamp(0.0, 1.0)
            })
            .collect::<Vec<_>>();
        if fractions.is_empty() {
            1.0
        } else {
            fractions.iter().sum::<f64>() / fractions.len() as f64
        }
    }

    fn urgency(&self) -> f64 {
        if self.config.max_queue > 0.0 {
            (self.config.sensitivity * self.queue / self.config.max_queue).exp()
        } else {
            1.0
        }
    }
}

impl BiddingStrategy for Backpressure {
    fn bid(&mut self, _: &Tenant, context: &RoundContext<'_>) -> Vec<Demand> {
        if !self.last_request.is_empty() {
            let served = self.served(context);
            let step = self.config.queue_step;
            self.queue = (self.queue + step * self.last_ratio * (1.0 - served) - step * served)
                .clamp(0.0, self.config.max_queue.max(0.0));
        }

        let ratio = self.rate_ratio();
        let scale = 1.0 + self.config.complexity * ratio;
        let urgency = self.urgency();

        let demand = self
            .config
            .base
            .iter()
            .filter_map(|(resource, &base)| {
                let quantity = base * scale;
                let price = context.price(resource)? * urgency;
                (quantity > 0.0).then(|| Demand {
                    resource: resource.clone(),
                    quantity,
                    price,
                })
            })
            .collect::<Vec<_>>();

        self.last_ratio = ratio;
        self.last_request = demand
            .iter()
            .map(|d| (d.resource.clone(), d.quantity))
            .collect();
        demand
    }
}
