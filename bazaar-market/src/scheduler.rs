use crate::{Auction, DeviceRegistry, Ledger, LedgerError, PricingEngine, RegistryError};
use bazaar_core::{
    models::{
        Allocation, Bid, ClearingOutcome, ConfigError, Credits, MarketConfig, Map, Prices, PriorityClass,
        Quantities, RoundSummary, Tenant, TenantError, TenantId,
    },
    ports::{BiddingStrategy, RoundContext, RoundObserver},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{Level, event, span};

/// Where the scheduler is within its round loop.
///
/// A fresh scheduler is `Idle`. Each round walks through `BidCollection`, `Pricing`,
/// `Clearing` and `Settlement` before resting at `Published`; the loop ends in
/// `Stopped`, after the configured number of rounds or on request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No round has run yet
    Idle,
    /// Strategies are producing bids
    BidCollection,
    /// This round's prices, computed from the last utilization, are posted
    Pricing,
    /// The auction is clearing bids
    Clearing,
    /// Trades are settling; periodic credit and decay follow
    Settlement,
    /// The round summary has been handed to the observers
    Published,
    /// Terminal: no further rounds will run
    Stopped,
}

/// A cloneable, thread-safe request to stop the round loop.
///
/// The scheduler checks the handle at each round boundary, so the round in
/// flight when `stop` is called still completes and publishes.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Has a stop been requested?
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Participant {
    tenant: Tenant,
    strategy: Box<dyn BiddingStrategy>,
}

/// The round loop.
///
/// The scheduler owns all mutable market state: the posted prices, the last
/// utilization and allocation, and the ledger. Every mutating operation takes
/// `&mut self`, so a partially settled round is never observable from outside.
pub struct Scheduler {
    config: MarketConfig,
    registry: DeviceRegistry,
    pricing: PricingEngine,
    auction: Auction,
    ledger: Ledger,

    participants: Vec<Participant>,
    priorities: Map<TenantId, PriorityClass>,
    observers: Vec<Box<dyn RoundObserver + Send>>,

    phase: Phase,
    round: u64,
    elapsed: Duration,
    prices: Prices,
    utilization: Quantities,
    allocation: Allocation,
    stop: StopHandle,
}

impl Scheduler {
    /// Validate the configuration and prepare the first round.
    ///
    /// Prices start at the registry's base prices, clamped into the band.
    pub fn new(config: MarketConfig, registry: DeviceRegistry) -> Result<Self, SchedulerError> {
        config.validate()?;

        let pricing = PricingEngine::new(config.pricing.clone())?;
        let auction = Auction::new(&config.auction);
        let ledger = Ledger::new(config.currency.clone())?;

        let prices = pricing.initial_prices(&registry);
        let utilization = registry
            .resource_types()
            .map(|resource| (resource.clone(), 0.0))
            .collect();

        Ok(Self {
            config,
            registry,
            pricing,
            auction,
            ledger,
            participants: Vec::new(),
            priorities: Map::default(),
            observers: Vec::new(),
            phase: Phase::Idle,
            round: 0,
            elapsed: Duration::ZERO,
            prices,
            utilization,
            allocation: Allocation::default(),
            stop: StopHandle::default(),
        })
    }

    /// Admit a tenant, opening its account.
    ///
    /// Tenants may join before the first round or between any two rounds; they bid
    /// from the next round on.
    pub fn add_tenant(
        &mut self,
        tenant: Tenant,
        strategy: Box<dyn BiddingStrategy>,
    ) -> Result<Credits, SchedulerError> {
        tenant.validate()?;
        let balance = self.ledger.open_account(&tenant)?;
        self.priorities.insert(tenant.id.clone(), tenant.priority);

        event!(
            Level::INFO,
            tenant = %tenant.id,
            priority = ?tenant.priority,
            %balance,
            "tenant admitted"
        );

        self.participants.push(Participant { tenant, strategy });
        Ok(balance)
    }

    /// Register an observer for every subsequent round
    pub fn subscribe(&mut self, observer: Box<dyn RoundObserver + Send>) {
        self.observers.push(observer);
    }

    /// A handle that stops the loop at the next round boundary
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one round.
    ///
    /// Returns `Ok(None)` once the scheduler has stopped, whether because the
    /// configured number of rounds has run or because a stop was requested. If
    /// settlement fails, the round is discarded and no market state changes.
    pub fn step(&mut self) -> Result<Option<RoundSummary>, SchedulerError> {
        if self.phase == Phase::Stopped {
            return Ok(None);
        }
        if self.round >= self.config.rounds || self.stop.is_stopped() {
            self.phase = Phase::Stopped;
            event!(Level::INFO, rounds = self.round, "market stopped");
            return Ok(None);
        }

        let round = self.round;
        let span = span!(Level::INFO, "auction round", round);
        let _guard = span.enter();
        let resume = self.phase;

        // Round 0 posts the seeded prices, later rounds follow the last utilization
        let posted = if round > 0 {
            self.pricing.update(&self.prices, &self.utilization)
        } else {
            self.prices.clone()
        };

        self.phase = Phase::BidCollection;
        let bids = self.collect_bids(&posted);

        self.phase = Phase::Pricing;
        event!(Level::DEBUG, prices = ?posted, "prices posted");

        self.phase = Phase::Clearing;
        let balances = self.ledger.snapshot();
        let outcome = self.auction.clear(
            round,
            &bids,
            &posted,
            self.registry.capacities(),
            &balances,
            &self.priorities,
        );

        self.commit(resume, posted, outcome).map(Some)
    }

    // Settle a cleared round and publish it. Nothing is written back unless
    // settlement succeeds; on failure the scheduler returns to `resume`.
    fn commit(
        &mut self,
        resume: Phase,
        posted: Prices,
        outcome: ClearingOutcome,
    ) -> Result<RoundSummary, SchedulerError> {
        let round = self.round;

        self.phase = Phase::Settlement;
        if let Err(error) = self.ledger.settle(&outcome.trades) {
            event!(Level::ERROR, round, %error, "settlement failed, round discarded");
            self.phase = resume;
            return Err(error.into());
        }
        let credited = self.ledger.credit_periodic(round);
        let decayed = self.ledger.decay(round);

        self.elapsed += self.config.auction.interval;
        self.prices = posted;
        self.utilization = outcome.utilization.clone();
        self.allocation = outcome.allocation.clone();

        let summary = RoundSummary {
            round,
            elapsed: self.elapsed,
            allocation: outcome.allocation,
            trades: outcome.trades,
            prices: self.prices.clone(),
            utilization: outcome.utilization,
            unmet_demand: outcome.unmet_demand,
            balances: self.ledger.snapshot(),
            malformed: outcome.malformed,
            credited,
            decayed,
        };

        self.phase = Phase::Published;
        for observer in self.observers.iter_mut() {
            observer.on_round(&summary);
        }

        self.round += 1;
        Ok(summary)
    }

    /// Run rounds until the scheduler stops, returning the number of rounds executed
    pub fn run(&mut self) -> Result<u64, SchedulerError> {
        let mut executed = 0;
        while self.step()?.is_some() {
            executed += 1;
        }
        Ok(executed)
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The index of the next round to run
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Simulated time elapsed so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The prices posted by the most recent published round
    pub fn prices(&self) -> &Prices {
        &self.prices
    }

    /// The utilization observed in the most recent round
    pub fn utilization(&self) -> &Quantities {
        &self.utilization
    }

    /// The allocation of the most recent round
    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// A copy of every balance
    pub fn balances(&self) -> Map<TenantId, Credits> {
        self.ledger.snapshot()
    }

    /// The currency ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The device registry
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The admitted tenants, in admission order
    pub fn tenants(&self) -> impl Iterator<Item = &Tenant> {
        self.participants.iter().map(|participant| &participant.tenant)
    }

    /// The configuration in effect
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    fn collect_bids(&mut self, prices: &Prices) -> Vec<Bid> {
        let round = self.round;
        let elapsed = self.elapsed;
        let utilization = &self.utilization;
        let capacity = self.registry.capacities();
        let ledger = &self.ledger;
        let allocation = &self.allocation;

        let gather = |participant: &mut Participant| -> Vec<Bid> {
            let id = &participant.tenant.id;
            let context = RoundContext {
                round,
                elapsed,
                prices,
                utilization,
                capacity,
                balance: ledger.balance(id).unwrap_or_default(),
                last_allocation: allocation.tenant(id),
            };
            participant
                .strategy
                .bid(&participant.tenant, &context)
                .into_iter()
                .map(|demand| Bid::new(id.clone(), round, demand))
                .collect()
        };

        // Batches come back in admission order either way
        #[cfg(feature = "parallel")]
        let batches: Vec<Vec<Bid>> = {
            use rayon::prelude::*;
            self.participants.par_iter_mut().map(gather).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let batches: Vec<Vec<Bid>> = self.participants.iter_mut().map(gather).collect();

        let bids = batches.into_iter().flatten().collect::<Vec<_>>();
        event!(Level::DEBUG, bids = bids.len(), "bids collected");
        bids
    }
}

/// Errors that prevent the scheduler from starting or continuing
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The market configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The device registry could not be built
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A ledger operation failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// A tenant definition is invalid
    #[error(transparent)]
    Tenant(#[from] TenantError),
}
