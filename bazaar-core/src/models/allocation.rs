use super::{Credits, Map, Quantities, ResourceType, TenantId};

/// A settled fill produced by one auction round.
///
/// Trades are immutable once emitted. The ledger debits `cost` from the tenant;
/// reporting consumes the rest.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trade {
    /// The round in which the trade settled
    pub round: u64,
    /// The tenant receiving the resource
    pub tenant: TenantId,
    /// The resource type traded
    pub resource: ResourceType,
    /// The granted quantity, always positive
    pub quantity: f64,
    /// The unit clearing price
    pub price: f64,
    /// The amount debited from the tenant for this trade
    pub cost: Credits,
}

/// The resource slices granted to each tenant in one round.
///
/// For every resource type, the sum of granted quantities across tenants never
/// exceeds the total device capacity for that resource type.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Allocation(Map<TenantId, Quantities>);

impl Allocation {
    /// Record a grant, adding to any existing grant for the same tenant and resource
    pub fn grant(&mut self, tenant: &TenantId, resource: &ResourceType, quantity: f64) {
        if quantity <= 0.0 {
            return;
        }
        if !self.0.contains_key(tenant) {
            self.0.insert(tenant.clone(), Quantities::default());
        }
        if let Some(grants) = self.0.get_mut(tenant) {
            grants.accumulate(resource.clone(), quantity);
        }
    }

    /// The quantity of `resource` granted to `tenant`
    pub fn granted(&self, tenant: &TenantId, resource: &ResourceType) -> f64 {
        self.0
            .get(tenant)
            .map(|grants| grants.value_or_zero(resource))
            .unwrap_or(0.0)
    }

    /// Everything granted to `tenant`, if anything
    pub fn tenant(&self, tenant: &TenantId) -> Option<&Quantities> {
        self.0.get(tenant)
    }

    /// The total quantity of `resource` granted across all tenants
    pub fn total(&self, resource: &ResourceType) -> f64 {
        self.0
            .values()
            .map(|grants| grants.value_or_zero(resource))
            .sum()
    }

    /// Iterate over (tenant, grants) pairs in grant order
    pub fn iter(&self) -> impl Iterator<Item = (&TenantId, &Quantities)> {
        self.0.iter()
    }

    /// Did anyone receive anything?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rebuild an allocation from a sequence of trades
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut allocation = Self::default();
        for trade in trades {
            allocation.grant(&trade.tenant, &trade.resource, trade.quantity);
        }
        allocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_accumulate_per_tenant_and_resource() {
        let a = TenantId::from("a");
        let b = TenantId::from("b");
        let cpu = ResourceType::from("cpu");

        let mut allocation = Allocation::default();
        allocation.grant(&a, &cpu, 2.0);
        allocation.grant(&a, &cpu, 1.0);
        allocation.grant(&b, &cpu, 4.0);
        allocation.grant(&b, &cpu, 0.0);

        assert_eq!(allocation.granted(&a, &cpu), 3.0);
        assert_eq!(allocation.total(&cpu), 7.0);
        assert_eq!(allocation.granted(&b, &"memory".into()), 0.0);
    }
}
