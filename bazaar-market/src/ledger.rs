use bazaar_core::models::{
    Account, ConfigError, Credits, CurrencyConfig, Map, Tenant, TenantId, Trade,
};
use tracing::{Level, event};

/// Is an event with period `interval` due at the end of `round`?
///
/// Rounds are zero-based, so with an interval of `k` the event fires after rounds
/// `k - 1`, `2k - 1`, and so on. An interval of zero never fires.
pub fn is_due(round: u64, interval: u64) -> bool {
    interval != 0 && (round + 1) % interval == 0
}

/// The currency ledger: the single source of truth for every tenant's balance.
///
/// Balances only change through the methods below. The auction reads a
/// [`snapshot`](Ledger::snapshot) and never writes; settlement is all-or-nothing.
#[derive(Clone, Debug)]
pub struct Ledger {
    config: CurrencyConfig,
    accounts: Map<TenantId, Account>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(config: CurrencyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            accounts: Map::default(),
        })
    }

    /// The currency parameters
    pub fn config(&self) -> &CurrencyConfig {
        &self.config
    }

    /// Open an account for `tenant`, endowed with the initial allocation scaled by its weight
    pub fn open_account(&mut self, tenant: &Tenant) -> Result<Credits, LedgerError> {
        if self.accounts.contains_key(&tenant.id) {
            return Err(LedgerError::DuplicateAccount(tenant.id.clone()));
        }
        let balance = self.config.initial_allocation.scale(tenant.weight);
        self.accounts
            .insert(tenant.id.clone(), Account::new(tenant.id.clone(), balance));
        event!(Level::DEBUG, tenant = %tenant.id, %balance, "account opened");
        Ok(balance)
    }

    /// The current balance of `tenant`
    pub fn balance(&self, tenant: &TenantId) -> Result<Credits, LedgerError> {
        self.account(tenant).map(|account| account.balance)
    }

    /// The account of `tenant`
    pub fn account(&self, tenant: &TenantId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(tenant)
            .ok_or_else(|| LedgerError::UnknownTenant(tenant.clone()))
    }

    /// All accounts, in the order they were opened
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// A copy of every balance, in account order
    pub fn snapshot(&self) -> Map<TenantId, Credits> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.balance))
            .collect()
    }

    /// Add `amount` to the balance of `tenant`
    pub fn credit(&mut self, tenant: &TenantId, amount: Credits) -> Result<Credits, LedgerError> {
        let account = self.account_mut(tenant)?;
        account.balance += amount;
        Ok(account.balance)
    }

    /// Remove `amount` from the balance of `tenant`, returning the new balance
    pub fn debit(&mut self, tenant: &TenantId, amount: Credits) -> Result<Credits, LedgerError> {
        let account = self.account_mut(tenant)?;
        let balance = account.balance;
        account.balance =
            balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::InsufficientFunds {
                    tenant: tenant.clone(),
                    balance,
                    amount,
                })?;
        Ok(account.balance)
    }

    /// Debit the cost of every trade from its tenant.
    ///
    /// Costs are aggregated per tenant and every debit is checked before any is
    /// applied, so either all trades settle or the ledger is left untouched.
    pub fn settle(&mut self, trades: &[Trade]) -> Result<Map<TenantId, Credits>, LedgerError> {
        let mut debits = Map::<TenantId, Credits>::default();
        for trade in trades.iter() {
            *debits.entry(trade.tenant.clone()).or_default() += trade.cost;
        }

        for (tenant, &amount) in debits.iter() {
            let balance = self.balance(tenant)?;
            if balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    tenant: tenant.clone(),
                    balance,
                    amount,
                });
            }
        }

        for (tenant, &amount) in debits.iter() {
            self.debit(tenant, amount)?;
        }

        event!(
            Level::DEBUG,
            trades = trades.len(),
            tenants = debits.len(),
            total = %debits.values().copied().sum::<Credits>(),
            "trades settled"
        );
        Ok(debits)
    }

    /// Apply the periodic allocation if one is due at the end of `round`.
    ///
    /// Every account receives the same fixed amount; endowment weights only
    /// apply when an account is opened.
    ///
    /// Returns whether the credit was applied.
    pub fn credit_periodic(&mut self, round: u64) -> bool {
        if !is_due(round, self.config.credit_interval) {
            return false;
        }
        let amount = self.config.periodic_allocation;
        for account in self.accounts.values_mut() {
            account.balance += amount;
            account.last_credit_round = Some(round);
        }
        event!(Level::DEBUG, round, %amount, "periodic credit applied");
        true
    }

    /// Decay every balance if decay is due at the end of `round`.
    ///
    /// Returns whether decay was applied.
    pub fn decay(&mut self, round: u64) -> bool {
        if !is_due(round, self.config.decay_interval) {
            return false;
        }
        let factor = self.config.decay_factor;
        let mut removed = Credits::ZERO;
        for account in self.accounts.values_mut() {
            let next = account.balance.scale(factor);
            let delta = account.balance.saturating_sub(next);
            account.balance = next;
            account.decayed += delta;
            removed += delta;
        }
        event!(Level::DEBUG, round, factor, %removed, "balances decayed");
        true
    }

    fn account_mut(&mut self, tenant: &TenantId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(tenant)
            .ok_or_else(|| LedgerError::UnknownTenant(tenant.clone()))
    }
}

/// Errors that can occur when operating on the ledger
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LedgerError {
    /// The tenant has no account
    #[error("no account for tenant {0}")]
    UnknownTenant(TenantId),
    /// The tenant already has an account
    #[error("tenant {0} already has an account")]
    DuplicateAccount(TenantId),
    /// The debit exceeds the balance
    #[error("tenant {tenant} cannot pay {amount} from a balance of {balance}")]
    InsufficientFunds {
        /// The debited tenant
        tenant: TenantId,
        /// Its balance at the time
        balance: Credits,
        /// The requested debit
        amount: Credits,
    },
}
