mod demand;
mod device;
mod observer;

pub use demand::{BiddingStrategy, RoundContext};
pub use device::DeviceSource;
pub use observer::RoundObserver;
