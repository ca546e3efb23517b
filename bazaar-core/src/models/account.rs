use super::{Credits, TenantId};

/// A tenant's currency account, as held by the ledger.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    /// The account holder
    pub tenant: TenantId,
    /// The current balance
    pub balance: Credits,
    /// The last round in which a periodic credit was applied, if any
    pub last_credit_round: Option<u64>,
    /// The total amount removed from this account by decay
    pub decayed: Credits,
}

impl Account {
    /// A fresh account holding `balance`
    pub fn new(tenant: TenantId, balance: Credits) -> Self {
        Self {
            tenant,
            balance,
            last_credit_round: None,
            decayed: Credits::ZERO,
        }
    }
}
