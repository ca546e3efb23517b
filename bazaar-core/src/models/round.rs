use super::{Allocation, Bid, Credits, Map, Prices, Quantities, ResourceType, TenantId, Trade};
use std::time::Duration;

/// Why a bid was excluded from clearing at intake.
///
/// Malformed bids are recovered locally: the bid is dropped, counted and
/// reported, and the round continues for everybody else.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MalformedBidError {
    /// No device offers the requested resource type
    #[error("unknown resource type {0}")]
    UnknownResource(ResourceType),
    /// The bidding tenant has no account
    #[error("unknown tenant {0}")]
    UnknownTenant(TenantId),
    /// The requested quantity was zero, negative or not finite
    #[error("requested quantity {0} is not a positive, finite number")]
    InvalidQuantity(f64),
    /// The offered price was not finite
    #[error("offered price {0} is not finite")]
    InvalidPrice(f64),
}

/// A bid that was rejected at intake, along with the reason
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MalformedBid {
    /// The offending bid
    pub bid: Bid,
    /// What was wrong with it
    pub error: MalformedBidError,
}

/// Why a well-formed bid went (partly) unfilled.
///
/// None of these are failures; they are the normal ways a market says no.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RejectionReason {
    /// The offered price was below the posted market price
    BelowMarket,
    /// The tenant could not afford any of the requested quantity
    InsufficientFunds,
    /// Higher-ranked bids consumed all capacity
    CapacityExhausted,
}

/// A well-formed bid that received less than it asked for
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rejection {
    /// The bid in question
    pub bid: Bid,
    /// How much of the requested quantity was granted
    pub granted: f64,
    /// The binding constraint
    pub reason: RejectionReason,
}

/// Everything the auction engine produces for one round
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClearingOutcome {
    /// Who got what
    pub allocation: Allocation,
    /// One trade per (tenant, resource type) with a nonzero fill
    pub trades: Vec<Trade>,
    /// Granted quantity over capacity, per resource type
    pub utilization: Quantities,
    /// Eligible requested quantity that went unfilled, per resource type
    pub unmet_demand: Quantities,
    /// Bids dropped at intake
    pub malformed: Vec<MalformedBid>,
    /// Well-formed bids that were not filled in full
    pub rejections: Vec<Rejection>,
}

impl ClearingOutcome {
    /// The total cost of the round's trades for each tenant
    pub fn spend(&self) -> Map<TenantId, Credits> {
        let mut spend = Map::<TenantId, Credits>::default();
        for trade in self.trades.iter() {
            *spend.entry(trade.tenant.clone()).or_default() += trade.cost;
        }
        spend
    }
}

/// The published result of one round.
///
/// This is an owned snapshot: observers may keep, clone or ship it anywhere, but
/// nothing they do with it can reach back into the market.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundSummary {
    /// The round index, starting at zero
    pub round: u64,
    /// Simulated time elapsed at the end of this round
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub elapsed: Duration,
    /// Who got what
    pub allocation: Allocation,
    /// The settled trades
    pub trades: Vec<Trade>,
    /// The prices this round cleared against
    pub prices: Prices,
    /// Granted over capacity, per resource type; the input to the next price update
    pub utilization: Quantities,
    /// Eligible demand left unfilled, per resource type
    pub unmet_demand: Quantities,
    /// Balances after settlement, periodic credit and decay
    pub balances: Map<TenantId, Credits>,
    /// Bids dropped at intake
    pub malformed: Vec<MalformedBid>,
    /// Whether a periodic credit was applied at the end of this round
    pub credited: bool,
    /// Whether decay was applied at the end of this round
    pub decayed: bool,
}

impl RoundSummary {
    /// Number of bids dropped at intake
    pub fn malformed_count(&self) -> usize {
        self.malformed.len()
    }
}
