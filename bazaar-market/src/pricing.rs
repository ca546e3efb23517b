use crate::DeviceRegistry;
use bazaar_core::models::{ConfigError, Prices, PricingConfig, Quantities};

/// Posts per-resource prices from utilization feedback.
///
/// The engine holds only its parameters; the price vector itself is owned by the
/// scheduler and passed in by reference, so the update is a pure function of the
/// previous prices and the observed utilization:
///
/// `p ← clamp(p · (1 + α · (u − target)), p_min, p_max)`
#[derive(Clone, Debug)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    /// Create an engine, rejecting parameters outside their domain
    pub fn new(config: PricingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The engine's parameters
    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Seed a price for every resource type from the devices' base prices
    pub fn initial_prices(&self, registry: &DeviceRegistry) -> Prices {
        registry
            .base_prices()
            .into_iter()
            .map(|(resource, price)| (resource, self.sanitize(price, self.config.min_price)))
            .collect()
    }

    /// Compute the next price vector.
    ///
    /// Every resource in `prices` gets a new price; utilization entries for resources
    /// that have no price are ignored. A missing or NaN utilization counts as zero.
    pub fn update(&self, prices: &Prices, utilization: &Quantities) -> Prices {
        let PricingConfig {
            alpha,
            target_utilization,
            ..
        } = self.config;

        prices
            .iter()
            .map(|(resource, &price)| {
                let previous = self.sanitize(price, self.config.min_price);
                let u = utilization.value_or_zero(resource);
                let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };

                let next = previous * (1.0 + alpha * (u - target_utilization));
                (resource.clone(), self.sanitize(next, previous))
            })
            .collect()
    }

    fn sanitize(&self, price: f64, fallback: f64) -> f64 {
        if price.is_finite() {
            self.config.clamp(price)
        } else {
            self.config.clamp(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bazaar_core::models::ResourceType;
    use rstest::*;

    #[fixture]
    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig {
            alpha: 0.5,
            target_utilization: 0.8,
            min_price: 1.0,
            max_price: 10.0,
        })
        .unwrap()
    }

    fn vector(value: f64) -> Quantities {
        std::iter::once((ResourceType::from("cpu"), value)).collect()
    }

    #[rstest]
    #[case::idle(0.0, 4.0 * (1.0 - 0.5 * 0.8))]
    #[case::saturated(1.0, 4.0 * (1.0 + 0.5 * 0.2))]
    #[case::on_target(0.8, 4.0)]
    #[case::above_one(3.0, 4.0 * (1.0 + 0.5 * 0.2))]
    #[case::nan(f64::NAN, 4.0 * (1.0 - 0.5 * 0.8))]
    fn follows_utilization(engine: PricingEngine, #[case] u: f64, #[case] expected: f64) {
        let next = engine.update(&vector(4.0), &vector(u));
        assert_relative_eq!(next.value_or_zero("cpu"), expected);
    }

    #[rstest]
    fn stays_in_band(engine: PricingEngine) {
        let mut prices = vector(5.0);
        for _ in 0..100 {
            prices = engine.update(&prices, &vector(1.0));
        }
        assert_eq!(prices.value_or_zero("cpu"), 10.0);

        for _ in 0..100 {
            prices = engine.update(&prices, &Quantities::default());
        }
        assert_eq!(prices.value_or_zero("cpu"), 1.0);
    }

    #[rstest]
    fn recovers_from_non_finite(engine: PricingEngine) {
        let next = engine.update(&vector(f64::INFINITY), &vector(0.5));
        let price = next.value_or_zero("cpu");
        assert!(price.is_finite() && price > 0.0);
    }

    #[rstest]
    fn is_idempotent(engine: PricingEngine) {
        let a = engine.update(&vector(3.0), &vector(0.3));
        let b = engine.update(&vector(3.0), &vector(0.3));
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_config() {
        let config = PricingConfig {
            alpha: 0.0,
            ..Default::default()
        };
        assert_eq!(
            PricingEngine::new(config).unwrap_err(),
            ConfigError::Alpha(0.0)
        );
    }
}
