use super::{DeviceId, Map, Quantities, ResourceType};

/// A compute device contributing capacity to the market.
///
/// Devices are immutable once constructed: the registry takes ownership of them at
/// startup and only ever hands out shared references. Construction goes through
/// [`DeviceDto`] so that capacities and prices are validated exactly once, whether
/// the device came from a configuration file or from code.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "DeviceDto", into = "DeviceDto")
)]
pub struct Device {
    id: DeviceId,
    category: String,
    capacity: Quantities,
    base_price: Map<ResourceType, f64>,
    power_draw: f64,
}

impl Device {
    /// Create a device from its raw description, validating all constraints
    pub fn new(dto: DeviceDto) -> Result<Self, DeviceError> {
        Self::try_from(dto)
    }

    /// The device identifier
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// A free-form classification, such as "edge" or "cloud"
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The capacity this device offers, per resource type
    pub fn capacity(&self) -> &Quantities {
        &self.capacity
    }

    /// The base unit price of each resource type on this device
    pub fn base_price(&self) -> &Map<ResourceType, f64> {
        &self.base_price
    }

    /// The nominal power draw, in watts
    pub fn power_draw(&self) -> f64 {
        self.power_draw
    }

    /// The cost of powering this device for `hours` at `cost_per_kwh`.
    ///
    /// Only used for reporting; power plays no part in clearing.
    pub fn power_cost(&self, hours: f64, cost_per_kwh: f64) -> f64 {
        self.power_draw * hours / 1000.0 * cost_per_kwh
    }
}

/// DTO to ensure that we always validate when we deserialize from an untrusted source
#[derive(Clone, Debug)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDto {
    /// The device identifier
    pub id: DeviceId,
    /// A free-form classification
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: String,
    /// Capacity per resource type
    pub capacity: Quantities,
    /// Base unit price per resource type; every resource with capacity needs one
    pub base_price: Map<ResourceType, f64>,
    /// Nominal power draw, in watts
    #[cfg_attr(feature = "serde", serde(default))]
    pub power_draw: f64,
}

impl From<Device> for DeviceDto {
    fn from(value: Device) -> Self {
        Self {
            id: value.id,
            category: value.category,
            capacity: value.capacity,
            base_price: value.base_price,
            power_draw: value.power_draw,
        }
    }
}

impl TryFrom<DeviceDto> for Device {
    type Error = DeviceError;

    /// Validates that:
    /// 1. The device offers at least one resource type
    /// 2. Every capacity is finite and non-negative
    /// 3. Every resource with capacity has a finite, positive base price
    /// 4. The power draw is finite and non-negative
    fn try_from(value: DeviceDto) -> Result<Self, Self::Error> {
        if value.capacity.is_empty() {
            return Err(DeviceError::NoResources(value.id));
        }

        for (resource, &amount) in value.capacity.iter() {
            if !amount.is_finite() || amount < 0.0 {
                return Err(DeviceError::InvalidCapacity {
                    device: value.id,
                    resource: resource.clone(),
                    amount,
                });
            }

            match value.base_price.get(resource) {
                Some(&price) if price.is_finite() && price > 0.0 => {}
                Some(&price) => {
                    return Err(DeviceError::InvalidPrice {
                        device: value.id,
                        resource: resource.clone(),
                        price,
                    });
                }
                None => {
                    return Err(DeviceError::MissingPrice {
                        device: value.id,
                        resource: resource.clone(),
                    });
                }
            }
        }

        if !value.power_draw.is_finite() || value.power_draw < 0.0 {
            return Err(DeviceError::InvalidPowerDraw(value.id));
        }

        // Prices for resources the device does not offer are meaningless
        let DeviceDto {
            id,
            category,
            capacity,
            mut base_price,
            power_draw,
        } = value;
        base_price.retain(|resource, _| capacity.contains_key(resource));

        Ok(Self {
            id,
            category,
            capacity,
            base_price,
            power_draw,
        })
    }
}

/// Errors that can occur when constructing a device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device has an empty capacity vector
    #[error("device {0} offers no resources")]
    NoResources(DeviceId),
    /// A capacity was negative, NaN or infinite
    #[error("device {device} has invalid {resource} capacity {amount}")]
    InvalidCapacity {
        /// The offending device
        device: DeviceId,
        /// The offending resource type
        resource: ResourceType,
        /// The rejected amount
        amount: f64,
    },
    /// A base price was non-positive, NaN or infinite
    #[error("device {device} has invalid {resource} base price {price}")]
    InvalidPrice {
        /// The offending device
        device: DeviceId,
        /// The offending resource type
        resource: ResourceType,
        /// The rejected price
        price: f64,
    },
    /// A resource with capacity has no base price
    #[error("device {device} has no base price for {resource}")]
    MissingPrice {
        /// The offending device
        device: DeviceId,
        /// The resource type lacking a price
        resource: ResourceType,
    },
    /// The power draw was negative, NaN or infinite
    #[error("device {0} has an invalid power draw")]
    InvalidPowerDraw(DeviceId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> DeviceDto {
        DeviceDto {
            id: "edge-1".into(),
            category: "edge".to_owned(),
            capacity: [("cpu".into(), 4.0), ("memory".into(), 8.0)]
                .into_iter()
                .collect(),
            base_price: [
                ("cpu".into(), 1.0),
                ("memory".into(), 0.5),
                ("gpu".into(), 9.0),
            ]
            .into_iter()
            .collect(),
            power_draw: 15.0,
        }
    }

    #[test]
    fn valid_device_drops_unused_prices() {
        let device = Device::new(dto()).unwrap();
        assert_eq!(device.capacity().len(), 2);
        assert_eq!(device.base_price().len(), 2);
        assert!(device.base_price().get("gpu").is_none());
    }

    #[test]
    fn rejects_negative_capacity() {
        let mut raw = dto();
        raw.capacity.insert("cpu".into(), -1.0);
        assert!(matches!(
            Device::new(raw),
            Err(DeviceError::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn rejects_missing_price() {
        let mut raw = dto();
        raw.base_price.shift_remove("memory");
        assert!(matches!(
            Device::new(raw),
            Err(DeviceError::MissingPrice { .. })
        ));
    }

    #[test]
    fn power_cost_in_kwh() {
        let device = Device::new(dto()).unwrap();
        // 15 W for 10 h is 0.15 kWh
        assert!((device.power_cost(10.0, 0.2) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_device() {
        let raw = r#"{
            "id": "cloud-1",
            "category": "cloud",
            "capacity": { "cpu": 32.0, "network": 10.0 },
            "base_price": { "cpu": 2.0, "network": 0.8 },
            "power_draw": 250.0
        }"#;

        let device = serde_json::from_str::<Device>(raw);
        assert!(device.is_ok());

        let raw = r#"{
            "id": "cloud-2",
            "capacity": { "cpu": 32.0 },
            "base_price": { "cpu": 0.0 }
        }"#;
        assert!(serde_json::from_str::<Device>(raw).is_err());
    }
}
