#![warn(missing_docs)]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

/**
 * The immutable catalog of devices and their aggregate capacities.
 */
mod registry;
pub use registry::{DeviceRegistry, RegistryError};

/**
 * Utilization-feedback pricing.
 */
mod pricing;
pub use pricing::PricingEngine;

/**
 * Greedy clearing of bids against capacity.
 */
mod auction;
pub use auction::Auction;

/**
 * Currency accounts, settlement, periodic credit and decay.
 */
mod ledger;
pub use ledger::{Ledger, LedgerError, is_due};

/**
 * The round loop.
 */
mod scheduler;
pub use scheduler::{Phase, Scheduler, SchedulerError, StopHandle};
