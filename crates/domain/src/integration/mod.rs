//! The contract every device integration implements, plus the
//! integrations themselves (pure half: options, state, diff, status, actions).

mod action;

pub mod abstract_device;
pub mod osc;
pub mod ptz;
pub mod websocket;

pub use action::{
    ActionDefinition, ActionEffect, ActionError, ActionHandler, ActionRegistry, ActionResponse,
    ActionResult, parse_payload,
};

use std::cmp::Ordering;
use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::command::{Command, CommandContext};
use crate::driver::{DeviceType, ExecutionMode, ReconnectPolicy};
use crate::error::DomainError;
use crate::status::StatusDetail;
use crate::timeline::{DeviceTimelineState, Mapping, Mappings, ResolvedObject};

/// Device-type specific behavior: options, state construction, diffing,
/// status catalog and action table.
///
/// Implementors are marker types; everything is an associated function so
/// that state construction and diffing stay free of hidden instance state.
pub trait Integration: Send + Sync + Sized + 'static {
    type Options: DeserializeOwned + Serialize + Clone + Debug + Send + Sync + 'static;
    type State: Clone + Debug + Default + PartialEq + Send + Sync + 'static;
    type Command: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;

    const DEVICE_TYPE: DeviceType;
    /// False for devices without a transport
    const CAN_CONNECT: bool = true;

    fn device_name(device_id: &str, options: &Self::Options) -> String;

    fn execution_mode(options: &Self::Options) -> ExecutionMode;

    fn validate_options(_options: &Self::Options) -> Result<(), DomainError> {
        Ok(())
    }

    fn validate_mapping(layer: &str, mapping: &Mapping) -> Result<(), DomainError> {
        if mapping.device != Self::DEVICE_TYPE {
            return Err(DomainError::InvalidMapping {
                layer: layer.to_string(),
                reason: format!(
                    "mapping targets {} but device {} is {}",
                    mapping.device,
                    mapping.device_id,
                    Self::DEVICE_TYPE
                ),
            });
        }
        Ok(())
    }

    fn reconnect_policy(_options: &Self::Options) -> ReconnectPolicy {
        ReconnectPolicy::default()
    }

    /// Pure: equal inputs give equal states
    fn build_state(timeline: &DeviceTimelineState, mappings: &Mappings) -> Self::State;

    /// Pure: ordered commands moving `old` to `new`; empty when equal
    fn diff_states(old: &Self::State, new: &Self::State) -> Vec<Command<Self::Command>>;

    /// Detail raised while the device is not connected, `None` if the
    /// integration has no such condition
    fn disconnected_status(
        device_id: &str,
        options: &Self::Options,
        reason: Option<&str>,
    ) -> Option<StatusDetail>;

    /// Short human-readable form used in logs and status messages
    fn describe(command: &Self::Command) -> String;

    fn action_manifest() -> &'static [ActionDefinition];

    fn actions() -> ActionRegistry<Self>;
}

/// Decode device options; `null` is treated as `{}`
pub fn parse_options<I: Integration>(options: &Value) -> Result<I::Options, DomainError> {
    let value = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| {
        DomainError::InvalidConfiguration(format!("{} options: {}", I::DEVICE_TYPE, e))
    })
}

/// A state field together with the timeline origin that set it
#[derive(Debug, Clone, Serialize)]
pub struct Tracked<T> {
    pub value: T,
    pub context: CommandContext,
}

impl<T> Tracked<T> {
    pub fn new(value: T, context: CommandContext) -> Self {
        Self { value, context }
    }

    pub fn from_object(value: T, object: &ResolvedObject) -> Self {
        Self {
            value,
            context: CommandContext {
                object_ids: object.origin_ids(),
                layer: object.layer().to_string(),
            },
        }
    }
}

/// Only the value takes part in equality, so a new origin alone is no change
impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// True when the tracked value was added, removed or modified
pub fn changed<T: PartialEq>(old: Option<&Tracked<T>>, new: Option<&Tracked<T>>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(a), Some(b)) => a.value != b.value,
        _ => true,
    }
}

/// Objects on layers mapped to this device type, strongest first:
/// higher priority, then layer name, then object id.
pub fn relevant_objects<'a, I: Integration>(
    timeline: &'a DeviceTimelineState,
    mappings: &Mappings,
) -> Vec<&'a ResolvedObject> {
    let mut objects: Vec<&ResolvedObject> = timeline
        .objects
        .iter()
        .filter(|obj| obj.object.content.device_type == I::DEVICE_TYPE)
        .filter(|obj| {
            mappings
                .get(obj.layer())
                .is_some_and(|m| m.device == I::DEVICE_TYPE)
        })
        .collect();
    objects.sort_by(|a, b| precedence(a, b));
    objects
}

fn precedence(a: &ResolvedObject, b: &ResolvedObject) -> Ordering {
    b.object
        .priority
        .cmp(&a.object.priority)
        .then_with(|| a.layer().cmp(b.layer()))
        .then_with(|| a.id().cmp(b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Enable, Instance, TimelineContent, TimelineObject};
    use serde_json::json;

    fn object(id: &str, layer: &str, priority: i32) -> ResolvedObject {
        ResolvedObject::new(
            TimelineObject::new(
                id,
                layer,
                TimelineContent::new(DeviceType::Abstract, json!({"value": id})),
                Enable::new(0, None),
            )
            .with_priority(priority),
            Instance { start: 0, end: None },
        )
    }

    #[test]
    fn test_tracked_equality_ignores_context() {
        let a = Tracked::new(5, CommandContext::new("obj1", "l1"));
        let b = Tracked::new(5, CommandContext::new("obj2", "l2"));
        assert_eq!(a, b);
        assert!(!changed(Some(&a), Some(&b)));
        assert!(changed(Some(&a), None));
        assert!(changed(None, Some(&b)));
        assert!(!changed::<i32>(None, None));
    }

    #[test]
    fn test_relevant_objects_precedence() {
        let mut mappings = Mappings::new();
        for layer in ["a", "b", "c"] {
            mappings.insert(layer.into(), Mapping::new(DeviceType::Abstract, "abs0"));
        }
        let timeline = DeviceTimelineState::new(
            0,
            vec![object("o3", "c", 0), object("o1", "b", 0), object("o2", "a", 5)],
        );

        let ordered: Vec<&str> = relevant_objects::<abstract_device::AbstractDevice>(
            &timeline, &mappings,
        )
        .iter()
        .map(|o| o.id())
        .collect();
        assert_eq!(ordered, vec!["o2", "o1", "o3"]);
    }

    #[test]
    fn test_unmapped_layers_are_ignored() {
        let mappings = Mappings::new();
        let timeline = DeviceTimelineState::new(0, vec![object("o1", "a", 0)]);
        assert!(
            relevant_objects::<abstract_device::AbstractDevice>(&timeline, &mappings).is_empty()
        );
    }

    #[test]
    fn test_parse_options_null_is_empty_object() {
        let options = parse_options::<abstract_device::AbstractDevice>(&Value::Null);
        assert!(options.is_ok());
    }

    #[test]
    fn test_validate_mapping_rejects_wrong_device_type() {
        let mapping = Mapping::new(DeviceType::Ptz, "abs0");
        let err = abstract_device::AbstractDevice::validate_mapping("l1", &mapping).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
