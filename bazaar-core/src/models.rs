mod account;
mod allocation;
mod bid;
mod config;
mod credits;
mod device;
mod ids;
mod map;
mod round;
mod tenant;

pub use account::Account;
pub use allocation::{Allocation, Trade};
pub use bid::{Bid, Demand};
pub use config::{
    AuctionConfig, ConfigError, CurrencyConfig, MarketConfig, PricingConfig, SettlementPolicy,
    TieBreak,
};
pub use credits::{Credits, CreditsError};
pub use device::{Device, DeviceDto, DeviceError};
pub use ids::{DeviceId, ResourceType, TenantId};
pub use map::Map;
pub use round::{
    ClearingOutcome, MalformedBid, MalformedBidError, Rejection, RejectionReason, RoundSummary,
};
pub use tenant::{PriorityClass, Tenant, TenantError};

/// The per-resource price vector posted by the pricing engine.
pub type Prices = Map<ResourceType, f64>;

/// A per-resource vector of quantities, e.g. device capacities or utilization fractions.
pub type Quantities = Map<ResourceType, f64>;

// Identifiers are human-authored strings in configuration files, so we wrap
// them in newtypes rather than passing raw strings around.
macro_rules! string_wrapper {
    ($struct:ident) => {
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(transparent)
        )]
        #[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
        #[doc = concat!("A newtype wrapper for ", stringify!($struct))]
        pub struct $struct(String);

        impl $struct {
            /// Borrow the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $struct {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $struct {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $struct {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $struct {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub(crate) use string_wrapper;
