//! Open Sound Control over UDP.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{
    ActionDefinition, ActionRegistry, Integration, Tracked, changed, relevant_objects,
};
use crate::command::Command;
use crate::driver::{DeviceType, ExecutionMode};
use crate::error::DomainError;
use crate::status::{StatusCatalog, StatusCode, StatusDetail, context_map, private};
use crate::timeline::{DeviceTimelineState, Mappings};

pub struct OscDevice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscOptions {
    pub host: String,
    pub port: u16,
}

/// One typed OSC argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum OscValue {
    Int(i32),
    Float(f32),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OscContent {
    pub path: String,
    #[serde(default)]
    pub values: Vec<OscValue>,
}

/// Address path -> arguments
pub type OscState = BTreeMap<String, Tracked<Vec<OscValue>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OscMessage {
    pub path: String,
    pub values: Vec<OscValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscStatus {
    Disconnected {
        device_name: String,
        host: String,
        port: u16,
    },
}

impl private::Sealed for OscStatus {}

impl StatusCatalog for OscStatus {
    fn code(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "OSC_DISCONNECTED",
        }
    }

    fn severity(&self) -> StatusCode {
        match self {
            Self::Disconnected { .. } => StatusCode::Bad,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "OSC device {{deviceName}} could not reach {{host}}:{{port}}",
        }
    }

    fn context(&self) -> Map<String, Value> {
        match self {
            Self::Disconnected {
                device_name,
                host,
                port,
            } => context_map(json!({"deviceName": device_name, "host": host, "port": port})),
        }
    }
}

const MANIFEST: &[ActionDefinition] = &[ActionDefinition {
    id: "resyncState",
    name: "Resync state",
    has_payload: false,
}];

impl Integration for OscDevice {
    type Options = OscOptions;
    type State = OscState;
    type Command = OscMessage;

    const DEVICE_TYPE: DeviceType = DeviceType::Osc;

    fn device_name(device_id: &str, _options: &Self::Options) -> String {
        device_id.to_string()
    }

    fn execution_mode(_options: &Self::Options) -> ExecutionMode {
        ExecutionMode::Salvo
    }

    fn validate_options(options: &Self::Options) -> Result<(), DomainError> {
        if options.host.trim().is_empty() {
            return Err(DomainError::InvalidConfiguration("osc host is empty".into()));
        }
        if options.port == 0 {
            return Err(DomainError::InvalidConfiguration("osc port is 0".into()));
        }
        Ok(())
    }

    fn build_state(timeline: &DeviceTimelineState, mappings: &Mappings) -> Self::State {
        let mut state = OscState::new();
        for object in relevant_objects::<Self>(timeline, mappings) {
            let Ok(content) = object.object.content.parse::<OscContent>() else {
                continue;
            };
            if !content.path.starts_with('/') {
                continue;
            }
            state
                .entry(content.path)
                .or_insert_with(|| Tracked::from_object(content.values, object));
        }
        state
    }

    fn diff_states(old: &Self::State, new: &Self::State) -> Vec<Command<Self::Command>> {
        // BTreeMap iteration keeps commands sorted by path
        new.iter()
            .filter(|(path, tracked)| changed(old.get(*path), Some(*tracked)))
            .map(|(path, tracked)| {
                Command::new(
                    OscMessage {
                        path: path.clone(),
                        values: tracked.value.clone(),
                    },
                    tracked.context.clone(),
                )
                .in_queue(path.clone())
            })
            .collect()
    }

    fn disconnected_status(
        device_id: &str,
        options: &Self::Options,
        _reason: Option<&str>,
    ) -> Option<StatusDetail> {
        Some(StatusDetail::new(OscStatus::Disconnected {
            device_name: Self::device_name(device_id, options),
            host: options.host.clone(),
            port: options.port,
        }))
    }

    fn describe(command: &Self::Command) -> String {
        format!("{} ({} args)", command.path, command.values.len())
    }

    fn action_manifest() -> &'static [ActionDefinition] {
        MANIFEST
    }

    fn actions() -> ActionRegistry<Self> {
        ActionRegistry::with_common()
    }
}
