use super::TenantId;

/// The priority class of a tenant, used to break ties between equal bids.
///
/// Classes are totally ordered, `Low < Medium < High`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PriorityClass {
    /// Best-effort workloads
    Low,
    /// The default class
    #[default]
    Medium,
    /// Latency-sensitive workloads
    High,
}

/// A participant in the market.
///
/// A tenant's balance lives in the ledger and its allocation lives in the
/// scheduler; this struct only carries what is fixed for the tenant's lifetime.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tenant {
    /// The tenant identifier
    pub id: TenantId,
    /// Tie-breaking priority in the auction
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: PriorityClass,
    /// Multiplier applied to the initial currency endowment
    #[cfg_attr(feature = "serde", serde(default = "default_weight"))]
    pub weight: f64,
}

#[cfg(feature = "serde")]
fn default_weight() -> f64 {
    1.0
}

impl Tenant {
    /// A tenant with the given id and priority and a unit endowment weight
    pub fn new(id: impl Into<TenantId>, priority: PriorityClass) -> Self {
        Self {
            id: id.into(),
            priority,
            weight: 1.0,
        }
    }

    /// Replace the endowment weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Check that the endowment weight is usable
    pub fn validate(&self) -> Result<(), TenantError> {
        if self.weight.is_finite() && self.weight > 0.0 {
            Ok(())
        } else {
            Err(TenantError::InvalidWeight {
                tenant: self.id.clone(),
                weight: self.weight,
            })
        }
    }
}

/// Errors describing an invalid tenant definition
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// The endowment weight was non-positive, NaN or infinite
    #[error("tenant {tenant} has invalid endowment weight {weight}")]
    InvalidWeight {
        /// The offending tenant
        tenant: TenantId,
        /// The rejected weight
        weight: f64,
    },
}
