//! Round reporting.
//!
//! The [`Reporter`] consumes published rounds, logs each one and accumulates a
//! [`RunReport`] that summarizes the whole run.

use bazaar_core::models::{
    Credits, Device, Map, Prices, Quantities, RoundSummary, SettlementPolicy, TenantId,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{Level, event};

/// What one tenant got out of the run
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TenantReport {
    /// Total quantity granted, per resource type
    pub granted: Quantities,
    /// Total amount paid for trades
    pub spent: Credits,
    /// Number of rounds in which the tenant was granted anything
    pub rounds_served: u64,
    /// Balance after the last round
    pub final_balance: Credits,
}

/// A summary of a complete run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// Number of rounds executed
    pub rounds: u64,
    /// Simulated time covered by the run
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// The settlement policy in effect
    pub settlement: SettlementPolicy,
    /// Per-tenant outcomes
    pub tenants: Map<TenantId, TenantReport>,
    /// Mean utilization over all rounds, per resource type
    pub mean_utilization: Quantities,
    /// Total eligible demand left unfilled, per resource type
    pub unmet_demand: Quantities,
    /// Number of bids dropped at intake
    pub malformed_bids: usize,
    /// The prices posted in the last round
    pub final_prices: Prices,
    /// The cost of powering the device pool for the simulated time
    pub energy_cost: f64,
}

/// Accumulates round summaries into a [`RunReport`]
#[derive(Debug)]
pub struct Reporter {
    settlement: SettlementPolicy,
    rounds: u64,
    elapsed: Duration,
    tenants: Map<TenantId, TenantReport>,
    utilization: Quantities,
    unmet_demand: Quantities,
    malformed_bids: usize,
    final_prices: Prices,
}

impl Reporter {
    /// An empty reporter for a run with the given settlement policy
    pub fn new(settlement: SettlementPolicy) -> Self {
        Self {
            settlement,
            rounds: 0,
            elapsed: Duration::ZERO,
            tenants: Map::default(),
            utilization: Quantities::default(),
            unmet_demand: Quantities::default(),
            malformed_bids: 0,
            final_prices: Prices::default(),
        }
    }

    /// Log and accumulate one round
    pub fn record(&mut self, summary: &RoundSummary) {
        let spent = summary.trades.iter().map(|trade| trade.cost).sum::<Credits>();
        event!(
            Level::INFO,
            round = summary.round,
            trades = summary.trades.len(),
            malformed = summary.malformed_count(),
            %spent,
            prices = ?summary.prices,
            utilization = ?summary.utilization,
            "round published"
        );

        self.rounds += 1;
        self.elapsed = summary.elapsed;
        self.malformed_bids += summary.malformed_count();
        self.final_prices = summary.prices.clone();

        for (resource, &u) in summary.utilization.iter() {
            self.utilization.accumulate(resource.clone(), u);
        }
        for (resource, &unmet) in summary.unmet_demand.iter() {
            self.unmet_demand.accumulate(resource.clone(), unmet);
        }

        for trade in summary.trades.iter() {
            let tenant = self.tenants.entry(trade.tenant.clone()).or_default();
            tenant.granted.accumulate(trade.resource.clone(), trade.quantity);
            tenant.spent += trade.cost;
        }
        for (id, _) in summary.allocation.iter() {
            self.tenants.entry(id.clone()).or_default().rounds_served += 1;
        }
        for (id, &balance) in summary.balances.iter() {
            self.tenants.entry(id.clone()).or_default().final_balance = balance;
        }
    }

    /// Close the books, pricing the energy the device pool drew over the run
    pub fn finish(self, devices: &[Device], cost_per_kwh: f64) -> RunReport {
        let hours = self.elapsed.as_secs_f64() / 3600.0;
        let energy_cost = devices
            .iter()
            .map(|device| device.power_cost(hours, cost_per_kwh))
            .sum();

        let rounds = self.rounds.max(1) as f64;
        let mean_utilization = self
            .utilization
            .into_iter()
            .map(|(resource, total)| (resource, total / rounds))
            .collect();

        RunReport {
            rounds: self.rounds,
            elapsed: self.elapsed,
            settlement: self.settlement,
            tenants: self.tenants,
            mean_utilization,
            unmet_demand: self.unmet_demand,
            malformed_bids: self.malformed_bids,
            final_prices: self.final_prices,
            energy_cost,
        }
    }
}
