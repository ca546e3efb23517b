use crate::models::Device;

/// Where the device catalog comes from.
///
/// The market reads the source exactly once, at startup, and treats the result
/// as a read-only snapshot. Loading devices from files, databases or a cluster
/// inventory is the implementor's business.
pub trait DeviceSource {
    /// Error type for a source that could not be read
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produce the devices, in the order the registry should list them
    fn devices(&self) -> Result<Vec<Device>, Self::Error>;
}

impl DeviceSource for Vec<Device> {
    type Error = std::convert::Infallible;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        Ok(self.clone())
    }
}

impl DeviceSource for [Device] {
    type Error = std::convert::Infallible;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        Ok(self.to_vec())
    }
}
