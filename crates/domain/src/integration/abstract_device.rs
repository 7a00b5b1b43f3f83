//! Device without a transport. Commands are only logged and published,
//! which makes it the reference for timeline-to-command behavior.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ActionDefinition, ActionEffect, ActionRegistry, Integration, Tracked, changed,
    relevant_objects,
};
use crate::command::Command;
use crate::driver::{DeviceType, ExecutionMode};
use crate::status::StatusDetail;
use crate::timeline::{DeviceTimelineState, Mappings};

pub struct AbstractDevice;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractOptions {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AbstractContent {
    #[serde(default)]
    pub value: Value,
}

/// Layer -> value
pub type AbstractState = BTreeMap<String, Tracked<Value>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AbstractCommand {
    Set { layer: String, value: Value },
    Clear { layer: String },
}

const MANIFEST: &[ActionDefinition] = &[
    ActionDefinition {
        id: "resyncState",
        name: "Resync state",
        has_payload: false,
    },
    ActionDefinition {
        id: "testAction",
        name: "Test action",
        has_payload: false,
    },
];

impl Integration for AbstractDevice {
    type Options = AbstractOptions;
    type State = AbstractState;
    type Command = AbstractCommand;

    const DEVICE_TYPE: DeviceType = DeviceType::Abstract;
    const CAN_CONNECT: bool = false;

    fn device_name(device_id: &str, options: &Self::Options) -> String {
        match &options.name {
            Some(name) => format!("Abstract {}", name),
            None => format!("Abstract {}", device_id),
        }
    }

    fn execution_mode(_options: &Self::Options) -> ExecutionMode {
        ExecutionMode::Salvo
    }

    fn build_state(timeline: &DeviceTimelineState, mappings: &Mappings) -> Self::State {
        let mut state = AbstractState::new();
        for object in relevant_objects::<Self>(timeline, mappings) {
            let Ok(content) = object.object.content.parse::<AbstractContent>() else {
                continue;
            };
            state
                .entry(object.layer().to_string())
                .or_insert_with(|| Tracked::from_object(content.value, object));
        }
        state
    }

    fn diff_states(old: &Self::State, new: &Self::State) -> Vec<Command<Self::Command>> {
        let clears = old
            .iter()
            .filter(|(layer, _)| !new.contains_key(*layer))
            .map(|(layer, tracked)| {
                Command::new(
                    AbstractCommand::Clear {
                        layer: layer.clone(),
                    },
                    tracked.context.clone(),
                )
            });

        let sets = new
            .iter()
            .filter(|(layer, tracked)| changed(old.get(*layer), Some(*tracked)))
            .map(|(layer, tracked)| {
                Command::new(
                    AbstractCommand::Set {
                        layer: layer.clone(),
                        value: tracked.value.clone(),
                    },
                    tracked.context.clone(),
                )
            });

        clears.chain(sets).collect()
    }

    fn disconnected_status(
        _device_id: &str,
        _options: &Self::Options,
        _reason: Option<&str>,
    ) -> Option<StatusDetail> {
        None
    }

    fn describe(command: &Self::Command) -> String {
        match command {
            AbstractCommand::Set { layer, value } => format!("set {} = {}", layer, value),
            AbstractCommand::Clear { layer } => format!("clear {}", layer),
        }
    }

    fn action_manifest() -> &'static [ActionDefinition] {
        MANIFEST
    }

    fn actions() -> ActionRegistry<Self> {
        ActionRegistry::with_common().register("testAction", |_, _| Ok(ActionEffect::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{
        Enable, Instance, Mapping, ResolvedObject, TimelineContent, TimelineObject,
    };
    use serde_json::json;

    fn mappings() -> Mappings {
        let mut mappings = Mappings::new();
        mappings.insert("l1".into(), Mapping::new(DeviceType::Abstract, "abs0"));
        mappings.insert("l2".into(), Mapping::new(DeviceType::Abstract, "abs0"));
        mappings.insert("l3".into(), Mapping::new(DeviceType::Abstract, "abs0"));
        mappings
    }

    fn object(id: &str, layer: &str, value: Value) -> ResolvedObject {
        ResolvedObject::new(
            TimelineObject::new(
                id,
                layer,
                TimelineContent::new(DeviceType::Abstract, json!({ "value": value })),
                Enable::new(0, None),
            ),
            Instance { start: 0, end: None },
        )
    }

    fn state(objects: Vec<ResolvedObject>) -> AbstractState {
        AbstractDevice::build_state(&DeviceTimelineState::new(0, objects), &mappings())
    }

    #[test]
    fn test_build_state_is_deterministic() {
        let objects = vec![object("a", "l1", json!(1)), object("b", "l2", json!("x"))];
        assert_eq!(state(objects.clone()), state(objects));
    }

    #[test]
    fn test_diff_is_idempotent_and_deterministic() {
        let old = state(vec![object("a", "l1", json!(1)), object("c", "l3", json!(true))]);
        let new = state(vec![object("a", "l1", json!(2)), object("b", "l2", json!({"k": "v"}))]);
        assert!(AbstractDevice::diff_states(&new, &new).is_empty());
        assert_eq!(
            AbstractDevice::diff_states(&old, &new),
            AbstractDevice::diff_states(&old, &new)
        );
    }

    #[test]
    fn test_clears_precede_sets() {
        let old = state(vec![object("a", "l1", json!(1))]);
        let new = state(vec![object("b", "l2", json!(2))]);

        let commands = AbstractDevice::diff_states(&old, &new);
        assert_eq!(commands.len(), 2);
        assert_eq!(
            *commands[0].content(),
            AbstractCommand::Clear { layer: "l1".into() }
        );
        assert_eq!(commands[0].context().object_ids, vec!["a"]);
        assert_eq!(
            *commands[1].content(),
            AbstractCommand::Set {
                layer: "l2".into(),
                value: json!(2)
            }
        );
        assert_eq!(commands[1].context().object_ids, vec!["b"]);
    }

    #[test]
    fn test_changed_value_emits_one_command() {
        let old = state(vec![object("a", "l1", json!(1)), object("b", "l2", json!(2))]);
        let new = state(vec![object("a", "l1", json!(1)), object("c", "l2", json!(3))]);
        let commands = AbstractDevice::diff_states(&old, &new);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].context().object_ids, vec!["c"]);
    }

    #[test]
    fn test_cannot_connect_and_is_salvo() {
        assert!(!AbstractDevice::CAN_CONNECT);
        assert_eq!(
            AbstractDevice::execution_mode(&AbstractOptions::default()),
            ExecutionMode::Salvo
        );
        assert!(
            AbstractDevice::disconnected_status("abs0", &AbstractOptions::default(), None)
                .is_none()
        );
    }
}
