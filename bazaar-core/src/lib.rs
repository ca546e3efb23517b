#![warn(missing_docs)]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

/// Core domain models for the resource market.
///
/// This module contains the fundamental data structures that represent the domain entities.
///
/// The models in this module are primarily data structures with minimal business logic,
/// following the principles of the hexagonal architecture to separate domain entities
/// from the engines that clear, price and settle them.
pub mod models;

/// Interface traits for the resource market.
///
/// This module contains the "ports" in the hexagonal architecture pattern.
///
/// These traits define the contract between the market engines and the outside world
/// (device catalogs, tenant demand, reporting) without specifying implementation details.
/// Every round of the market is driven only through these seams, which keeps rounds
/// replayable in tests and lets the simulation driver plug in its own strategies.
pub mod ports;
