use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::Integration;
use crate::command::Command;

/// Manifest entry of a device action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub has_payload: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action {0} requires a payload")]
    MissingPayload(String),

    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// What the worker should do after an action handler ran
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEffect<C> {
    /// Put commands on the dispatch queue
    Enqueue(Vec<Command<C>>),
    /// Forget the last-sent state and re-diff the current target
    ResyncState,
    /// Drop and re-establish the connection
    Reconnect,
    None,
}

/// Handlers are plain functions of the device options and the payload
pub type ActionHandler<I> = fn(
    &<I as Integration>::Options,
    Option<&Value>,
) -> Result<ActionEffect<<I as Integration>::Command>, ActionError>;

/// Action id -> handler
pub struct ActionRegistry<I: Integration> {
    handlers: BTreeMap<&'static str, ActionHandler<I>>,
}

impl<I: Integration> ActionRegistry<I> {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registry with the actions every integration supports
    pub fn with_common() -> Self {
        Self::new().register("resyncState", |_, _| Ok(ActionEffect::ResyncState))
    }

    pub fn register(mut self, id: &'static str, handler: ActionHandler<I>) -> Self {
        self.handlers.insert(id, handler);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ActionHandler<I>> {
        self.handlers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn execute(
        &self,
        id: &str,
        options: &I::Options,
        payload: Option<&Value>,
    ) -> Result<ActionEffect<I::Command>, ActionError> {
        let handler = self
            .get(id)
            .ok_or_else(|| ActionError::UnknownAction(id.to_string()))?;
        handler(options, payload)
    }
}

impl<I: Integration> Default for ActionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an action payload
pub fn parse_payload<T: DeserializeOwned>(
    action: &str,
    payload: Option<&Value>,
) -> Result<T, ActionError> {
    let payload = payload.ok_or_else(|| ActionError::MissingPayload(action.to_string()))?;
    serde_json::from_value(payload.clone()).map_err(|e| ActionError::InvalidPayload {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionResult {
    Ok,
    Error,
}

/// Result of executing an action, returned to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            result: ActionResult::Ok,
            message: None,
            response: None,
        }
    }

    pub fn ok_with(response: Value) -> Self {
        Self {
            response: Some(response),
            ..Self::ok()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: ActionResult::Error,
            message: Some(message.into()),
            response: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == ActionResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::abstract_device::AbstractDevice;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Preset {
        preset: u8,
    }

    #[test]
    fn test_common_registry_has_resync() {
        let registry = ActionRegistry::<AbstractDevice>::with_common();
        assert!(registry.contains("resyncState"));
        let effect = registry
            .execute("resyncState", &Default::default(), None)
            .unwrap();
        assert_eq!(effect, ActionEffect::ResyncState);
    }

    #[test]
    fn test_unknown_action() {
        let registry = ActionRegistry::<AbstractDevice>::new();
        let err = registry
            .execute("nope", &Default::default(), None)
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownAction("nope".into()));
    }

    #[test]
    fn test_parse_payload() {
        let payload = json!({"preset": 4});
        let parsed: Preset = parse_payload("recallPreset", Some(&payload)).unwrap();
        assert_eq!(parsed.preset, 4);

        let missing = parse_payload::<Preset>("recallPreset", None).unwrap_err();
        assert_eq!(missing, ActionError::MissingPayload("recallPreset".into()));

        let bad = json!({"preset": "x"});
        assert!(matches!(
            parse_payload::<Preset>("recallPreset", Some(&bad)),
            Err(ActionError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_action_response_serialization() {
        let value = serde_json::to_value(ActionResponse::error("not connected")).unwrap();
        assert_eq!(value["result"], "error");
        assert_eq!(value["message"], "not connected");
        assert!(value.get("response").is_none());
    }
}
