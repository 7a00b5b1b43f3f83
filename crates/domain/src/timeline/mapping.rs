use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::DeviceType;

/// Binds one timeline layer to exactly one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub device: DeviceType,
    #[serde(alias = "deviceid")]
    pub device_id: String,
    /// Layer-specific options interpreted by the device integration
    #[serde(default)]
    pub options: Value,
}

impl Mapping {
    pub fn new(device: DeviceType, device_id: impl Into<String>) -> Self {
        Self {
            device,
            device_id: device_id.into(),
            options: Value::Null,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

/// Layer name -> mapping. Ordered so iteration is deterministic.
pub type Mappings = BTreeMap<String, Mapping>;

/// The subset of `mappings` that targets `device_id`
pub fn mappings_for_device(mappings: &Mappings, device_id: &str) -> Mappings {
    mappings
        .iter()
        .filter(|(_, mapping)| mapping.device_id == device_id)
        .map(|(layer, mapping)| (layer.clone(), mapping.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_by_device() {
        let mut mappings = Mappings::new();
        mappings.insert("cam1".into(), Mapping::new(DeviceType::Ptz, "ptz0"));
        mappings.insert("cam2".into(), Mapping::new(DeviceType::Ptz, "ptz1"));
        mappings.insert("gfx".into(), Mapping::new(DeviceType::Osc, "osc0"));

        let filtered = mappings_for_device(&mappings, "ptz0");
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("cam1"));
    }

    #[test]
    fn test_deserialize_mapping() {
        let mapping: Mapping = serde_json::from_value(json!({
            "device": "osc",
            "deviceId": "osc0",
            "options": {"prefix": "/lights"}
        }))
        .unwrap();
        assert_eq!(mapping.device, DeviceType::Osc);
        assert_eq!(mapping.device_id, "osc0");
        assert_eq!(mapping.options["prefix"], "/lights");
    }

    #[test]
    fn test_options_default_to_null() {
        let mapping: Mapping =
            serde_json::from_value(json!({"device": "abstract", "deviceId": "a0"})).unwrap();
        assert!(mapping.options.is_null());
    }
}
