use crate::models::{Credits, Demand, Prices, Quantities, ResourceType, Tenant};
use std::time::Duration;

/// A read-only view of the market, handed to a bidding strategy at the start of a round.
///
/// `prices` are the prices this round will clear at. They depend only on the
/// utilization of the previous round, so they are known before any bid is placed,
/// and a bid at `price(resource)` is never below market.
#[derive(Debug)]
pub struct RoundContext<'a> {
    /// The index of the round being bid on
    pub round: u64,
    /// Simulated time elapsed before this round
    pub elapsed: Duration,
    /// The prices posted for this round
    pub prices: &'a Prices,
    /// Last published utilization
    pub utilization: &'a Quantities,
    /// Total capacity per resource type
    pub capacity: &'a Quantities,
    /// The bidding tenant's current balance
    pub balance: Credits,
    /// What the bidding tenant was granted last round
    pub last_allocation: Option<&'a Quantities>,
}

impl RoundContext<'_> {
    /// The posted price of a resource type
    pub fn price(&self, resource: &ResourceType) -> Option<f64> {
        self.prices.get(resource).copied()
    }

    /// What the tenant was granted of `resource` last round
    pub fn last_granted(&self, resource: &ResourceType) -> f64 {
        self.last_allocation
            .map(|grants| grants.value_or_zero(resource))
            .unwrap_or(0.0)
    }
}

/// How a tenant turns market conditions into demand.
///
/// Strategies are polymorphic per tenant and owned by the scheduler. The scheduler
/// depends only on this trait, i.e. on "produces bids for round N", never on how a
/// strategy arrives at them. A strategy returning nothing simply sits the round out.
///
/// Strategies must be `Send` so that bid collection may run on several threads; bids
/// from independent tenants have no ordering requirement.
pub trait BiddingStrategy: Send {
    /// Produce this round's demand for `tenant`
    fn bid(&mut self, tenant: &Tenant, context: &RoundContext<'_>) -> Vec<Demand>;
}

impl<F> BiddingStrategy for F
where
    F: FnMut(&Tenant, &RoundContext<'_>) -> Vec<Demand> + Send,
{
    fn bid(&mut self, tenant: &Tenant, context: &RoundContext<'_>) -> Vec<Demand> {
        self(tenant, context)
    }
}
