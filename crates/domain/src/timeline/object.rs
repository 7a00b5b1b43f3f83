use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::driver::DeviceType;

/// Enable window of a timeline object, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enable {
    pub start: i64,
    #[serde(default)]
    pub end: Option<i64>,
}

impl Enable {
    pub fn new(start: i64, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Start is inclusive, end exclusive. No end means open-ended.
    pub fn contains(&self, time: i64) -> bool {
        time >= self.start && self.end.is_none_or(|end| time < end)
    }
}

/// Device-specific content of a timeline object.
///
/// Tagged by `deviceType`; the remaining fields are interpreted by the
/// integration for that device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineContent {
    pub device_type: DeviceType,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TimelineContent {
    pub fn new(device_type: DeviceType, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            device_type,
            payload,
        }
    }

    /// Decode the payload into the integration's content type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineObject {
    pub id: String,
    pub layer: String,
    pub content: TimelineContent,
    #[serde(default)]
    pub priority: i32,
    pub enable: Enable,
}

impl TimelineObject {
    pub fn new(
        id: impl Into<String>,
        layer: impl Into<String>,
        content: TimelineContent,
        enable: Enable,
    ) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            content,
            priority: 0,
            enable,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Resolved window an object is active in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub start: i64,
    #[serde(default)]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedObject {
    #[serde(flatten)]
    pub object: TimelineObject,
    pub instance: Instance,
    /// Ids of the objects this one was resolved from
    #[serde(default)]
    pub references: Vec<String>,
}

impl ResolvedObject {
    pub fn new(object: TimelineObject, instance: Instance) -> Self {
        Self {
            object,
            instance,
            references: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn id(&self) -> &str {
        &self.object.id
    }

    pub fn layer(&self) -> &str {
        &self.object.layer
    }

    /// Object id followed by its references
    pub fn origin_ids(&self) -> Vec<String> {
        std::iter::once(self.object.id.clone())
            .chain(self.references.iter().cloned())
            .collect()
    }
}

/// Objects active at `time`, in resolver order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceTimelineState {
    pub time: i64,
    pub objects: Vec<ResolvedObject>,
}

impl DeviceTimelineState {
    pub fn new(time: i64, objects: Vec<ResolvedObject>) -> Self {
        Self { time, objects }
    }

    /// Keep only objects on the given layers
    pub fn retain_layers<'a, I>(&self, layers: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let layers: std::collections::BTreeSet<&String> = layers.into_iter().collect();
        Self {
            time: self.time,
            objects: self
                .objects
                .iter()
                .filter(|obj| layers.contains(&obj.object.layer))
                .cloned()
                .collect(),
        }
    }
}
