use super::{ResourceType, TenantId};

/// What a bidding strategy asks for: a quantity of one resource at a unit price.
///
/// The scheduler turns each demand into a [`Bid`] by stamping it with the tenant
/// and the round, so a strategy has no way to bid on another tenant's behalf.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Demand {
    /// The requested resource type
    pub resource: ResourceType,
    /// The requested quantity
    pub quantity: f64,
    /// The highest unit price the tenant is willing to pay
    pub price: f64,
}

impl Demand {
    /// Convenience constructor
    pub fn new(resource: impl Into<ResourceType>, quantity: f64, price: f64) -> Self {
        Self {
            resource: resource.into(),
            quantity,
            price,
        }
    }
}

/// A bid submitted to one auction round.
///
/// Bids are ephemeral: created fresh each round, consumed by the auction and never
/// mutated after submission. They are *not* validated on construction; malformed
/// bids are the auction's business (see `MalformedBidError`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bid {
    /// The bidding tenant
    pub tenant: TenantId,
    /// The requested resource type
    pub resource: ResourceType,
    /// The requested quantity
    pub quantity: f64,
    /// The offered unit price
    pub price: f64,
    /// The round this bid was submitted to
    pub round: u64,
}

impl Bid {
    /// Stamp a demand with its tenant and round
    pub fn new(tenant: TenantId, round: u64, demand: Demand) -> Self {
        let Demand {
            resource,
            quantity,
            price,
        } = demand;
        Self {
            tenant,
            resource,
            quantity,
            price,
            round,
        }
    }
}
