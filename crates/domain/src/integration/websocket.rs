//! Generic WebSocket client devices: each layer's message is sent as JSON text.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{
    ActionDefinition, ActionEffect, ActionError, ActionRegistry, Integration, Tracked, changed,
    parse_payload, relevant_objects,
};
use crate::command::{Command, CommandContext};
use crate::driver::{DeviceType, ExecutionMode, ReconnectPolicy};
use crate::error::DomainError;
use crate::status::{StatusCatalog, StatusCode, StatusDetail, context_map, private};
use crate::timeline::{DeviceTimelineState, Mappings};

pub struct WebsocketDevice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsocketOptions {
    pub uri: String,
    #[serde(default, alias = "reconnectintervalms")]
    pub reconnect_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebsocketContent {
    pub message: Value,
}

/// Layer -> message
pub type WebsocketState = BTreeMap<String, Tracked<Value>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebsocketMessage {
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebsocketStatus {
    Disconnected { uri: String, reason: String },
}

impl private::Sealed for WebsocketStatus {}

impl StatusCatalog for WebsocketStatus {
    fn code(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "WEBSOCKET_DISCONNECTED",
        }
    }

    fn severity(&self) -> StatusCode {
        match self {
            Self::Disconnected { .. } => StatusCode::Bad,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "WS Disconnected: {{uri}} ({{reason}})",
        }
    }

    fn context(&self) -> Map<String, Value> {
        match self {
            Self::Disconnected { uri, reason } => context_map(json!({"uri": uri, "reason": reason})),
        }
    }
}

const MANIFEST: &[ActionDefinition] = &[
    ActionDefinition {
        id: "resyncState",
        name: "Resync state",
        has_payload: false,
    },
    ActionDefinition {
        id: "reconnect",
        name: "Reconnect",
        has_payload: false,
    },
    ActionDefinition {
        id: "sendMessage",
        name: "Send message",
        has_payload: true,
    },
];

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    message: Value,
}

fn send_message(
    _options: &WebsocketOptions,
    payload: Option<&Value>,
) -> Result<ActionEffect<WebsocketMessage>, ActionError> {
    let SendMessagePayload { message } = parse_payload("sendMessage", payload)?;
    Ok(ActionEffect::Enqueue(vec![Command::new(
        WebsocketMessage { payload: message },
        CommandContext::internal("action:sendMessage"),
    )]))
}

impl Integration for WebsocketDevice {
    type Options = WebsocketOptions;
    type State = WebsocketState;
    type Command = WebsocketMessage;

    const DEVICE_TYPE: DeviceType = DeviceType::Websocket;

    fn device_name(device_id: &str, options: &Self::Options) -> String {
        format!("WebSocket {} ({})", device_id, options.uri)
    }

    fn execution_mode(_options: &Self::Options) -> ExecutionMode {
        ExecutionMode::Salvo
    }

    fn validate_options(options: &Self::Options) -> Result<(), DomainError> {
        let uri = options.uri.trim();
        if !(uri.starts_with("ws://") || uri.starts_with("wss://")) {
            return Err(DomainError::InvalidConfiguration(format!(
                "websocket uri must start with ws:// or wss://, got '{}'",
                options.uri
            )));
        }
        Ok(())
    }

    fn reconnect_policy(options: &Self::Options) -> ReconnectPolicy {
        match options.reconnect_interval_ms {
            Some(ms) => ReconnectPolicy::with_initial_delay(Duration::from_millis(ms)),
            None => ReconnectPolicy::default(),
        }
    }

    fn build_state(timeline: &DeviceTimelineState, mappings: &Mappings) -> Self::State {
        let mut state = WebsocketState::new();
        for object in relevant_objects::<Self>(timeline, mappings) {
            let Ok(content) = object.object.content.parse::<WebsocketContent>() else {
                continue;
            };
            state
                .entry(object.layer().to_string())
                .or_insert_with(|| Tracked::from_object(content.message, object));
        }
        state
    }

    fn diff_states(old: &Self::State, new: &Self::State) -> Vec<Command<Self::Command>> {
        new.iter()
            .filter(|(layer, tracked)| changed(old.get(*layer), Some(*tracked)))
            .map(|(_, tracked)| {
                Command::new(
                    WebsocketMessage {
                        payload: tracked.value.clone(),
                    },
                    tracked.context.clone(),
                )
            })
            .collect()
    }

    fn disconnected_status(
        _device_id: &str,
        options: &Self::Options,
        reason: Option<&str>,
    ) -> Option<StatusDetail> {
        Some(StatusDetail::new(WebsocketStatus::Disconnected {
            uri: options.uri.clone(),
            reason: reason.unwrap_or("not connected").to_string(),
        }))
    }

    fn describe(command: &Self::Command) -> String {
        let text = command.payload.to_string();
        match text.char_indices().nth(64) {
            Some((idx, _)) => format!("message {}...", &text[..idx]),
            None => format!("message {}", text),
        }
    }

    fn action_manifest() -> &'static [ActionDefinition] {
        MANIFEST
    }

    fn actions() -> ActionRegistry<Self> {
        ActionRegistry::with_common()
            .register("reconnect", |_, _| Ok(ActionEffect::Reconnect))
            .register("sendMessage", send_message)
    }
}
