use bazaar_core::{
    models::{Device, DeviceId, Map, Prices, Quantities, ResourceType},
    ports::DeviceSource,
};
use indexmap::IndexSet;
use tracing::{Level, event};

/// The immutable catalog of devices.
///
/// The registry is built once at startup and is read-only thereafter. It keeps the
/// devices in the order the source listed them, and aggregates their capacities per
/// resource type in first-seen order, which is also the order in which the auction
/// clears resource types.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    capacity: Quantities,
}

impl DeviceRegistry {
    /// Build a registry from a sequence of devices.
    ///
    /// An empty sequence is a fatal configuration error: a market without supply
    /// cannot clear anything.
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Result<Self, RegistryError> {
        let devices = devices.into_iter().collect::<Vec<_>>();
        if devices.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = IndexSet::with_capacity(devices.len());
        let mut capacity = Quantities::default();
        for device in devices.iter() {
            if !seen.insert(device.id().clone()) {
                return Err(RegistryError::DuplicateDevice(device.id().clone()));
            }
            for (resource, &amount) in device.capacity().iter() {
                capacity.accumulate(resource.clone(), amount);
            }
        }

        event!(
            Level::DEBUG,
            devices = devices.len(),
            resources = capacity.len(),
            "device registry loaded"
        );

        Ok(Self { devices, capacity })
    }

    /// Build a registry by reading a device source once
    pub fn from_source<S: DeviceSource + ?Sized>(source: &S) -> Result<Self, RegistryError> {
        let devices = source
            .devices()
            .map_err(|error| RegistryError::Source(Box::new(error)))?;
        Self::new(devices)
    }

    /// The total capacity of a resource type across all devices
    pub fn capacity(&self, resource: &ResourceType) -> Result<f64, RegistryError> {
        self.capacity
            .get(resource)
            .copied()
            .ok_or_else(|| RegistryError::UnknownResource(resource.clone()))
    }

    /// Total capacity per resource type, in first-seen order
    pub fn capacities(&self) -> &Quantities {
        &self.capacity
    }

    /// The devices, in source order
    pub fn list_devices(&self) -> &[Device] {
        &self.devices
    }

    /// Look up a device by id
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|device| device.id() == id)
    }

    /// The known resource types, in clearing order
    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.capacity.keys()
    }

    /// The combined nominal power draw of every device, in watts
    pub fn total_power_draw(&self) -> f64 {
        self.devices.iter().map(Device::power_draw).sum()
    }

    /// The capacity-weighted mean base price of each resource type.
    ///
    /// Devices that offer a resource but with zero capacity carry no weight; if no
    /// device offers positive capacity of a resource, the plain mean is used.
    pub fn base_prices(&self) -> Prices {
        self.capacity
            .iter()
            .map(|(resource, &total)| {
                let offers = self.devices.iter().filter_map(|device| {
                    let price = *device.base_price().get(resource)?;
                    let amount = device.capacity().value_or_zero(resource);
                    Some((amount, price))
                });

                let price = if total > 0.0 {
                    offers.map(|(amount, price)| amount * price).sum::<f64>() / total
                } else {
                    let (count, sum) = offers.fold((0usize, 0.0), |(n, s), (_, price)| {
                        (n + 1, s + price)
                    });
                    sum / count.max(1) as f64
                };

                (resource.clone(), price)
            })
            .collect::<Map<_, _>>()
    }
}

/// Errors that can occur when building or querying the registry.
///
/// All of these are configuration errors: they surface at startup and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The device source produced no devices
    #[error("no devices configured")]
    Empty,
    /// Two devices share an id
    #[error("duplicate device id {0}")]
    DuplicateDevice(DeviceId),
    /// No device offers the resource type
    #[error("unknown resource type {0}")]
    UnknownResource(ResourceType),
    /// The device source could not be read
    #[error("failed to read device source: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::models::DeviceDto;

    fn device(id: &str, cpu: f64, cpu_price: f64, memory: f64) -> Device {
        Device::new(DeviceDto {
            id: id.into(),
            category: "edge".to_owned(),
            capacity: [("cpu".into(), cpu), ("memory".into(), memory)]
                .into_iter()
                .collect(),
            base_price: [("cpu".into(), cpu_price), ("memory".into(), 0.5)]
                .into_iter()
                .collect(),
            power_draw: 10.0,
        })
        .unwrap()
    }

    #[test]
    fn aggregates_capacity() {
        let registry =
            DeviceRegistry::new(vec![device("a", 4.0, 1.0, 8.0), device("b", 12.0, 3.0, 16.0)])
                .unwrap();

        assert_eq!(registry.capacity(&"cpu".into()).unwrap(), 16.0);
        assert_eq!(registry.capacity(&"memory".into()).unwrap(), 24.0);
        assert!(matches!(
            registry.capacity(&"gpu".into()),
            Err(RegistryError::UnknownResource(_))
        ));
        assert_eq!(registry.list_devices().len(), 2);
        assert_eq!(registry.total_power_draw(), 20.0);
        assert!(registry.device(&"b".into()).is_some());
    }

    #[test]
    fn base_prices_are_capacity_weighted() {
        let registry =
            DeviceRegistry::new(vec![device("a", 4.0, 1.0, 8.0), device("b", 12.0, 3.0, 16.0)])
                .unwrap();

        let prices = registry.base_prices();
        // (4 * 1 + 12 * 3) / 16
        assert_eq!(prices.value_or_zero("cpu"), 2.5);
        assert_eq!(prices.value_or_zero("memory"), 0.5);
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert!(matches!(
            DeviceRegistry::new(Vec::new()),
            Err(RegistryError::Empty)
        ));
        assert!(matches!(
            DeviceRegistry::new(vec![device("a", 1.0, 1.0, 1.0), device("a", 1.0, 1.0, 1.0)]),
            Err(RegistryError::DuplicateDevice(_))
        ));
    }

    #[test]
    fn reads_a_source() {
        let source = vec![device("a", 4.0, 1.0, 8.0)];
        let registry = DeviceRegistry::from_source(&source).unwrap();
        assert_eq!(registry.resource_types().count(), 2);
    }
}
