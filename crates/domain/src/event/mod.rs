use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

mod publisher;
pub use publisher::EventPublisher;

use crate::command::CommandContext;
use crate::driver::ConnectionState;
use crate::status::DeviceStatus;

/// Events a device worker reports to the host
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DeviceEvent {
    /// Connection lifecycle transition
    ConnectionChanged {
        device_id: String,
        state: ConnectionState,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Derived status changed (severity or details)
    StatusChanged {
        device_id: String,
        status: DeviceStatus,
        timestamp: DateTime<Utc>,
    },

    /// Command handed to the driver
    CommandSent {
        device_id: String,
        command: String,
        context: CommandContext,
        timestamp: DateTime<Utc>,
    },

    /// Command acknowledged by the device
    CommandCompleted {
        device_id: String,
        command: String,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Command rejected, timed out, or failed to send
    CommandFailed {
        device_id: String,
        command: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Decoded reply to an inquiry
    InquiryReply {
        device_id: String,
        query: String,
        value: Value,
        timestamp: DateTime<Utc>,
    },
}

impl DeviceEvent {
    pub fn connection_changed(
        device_id: impl Into<String>,
        state: ConnectionState,
        reason: Option<String>,
    ) -> Self {
        Self::ConnectionChanged {
            device_id: device_id.into(),
            state,
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn status_changed(device_id: impl Into<String>, status: DeviceStatus) -> Self {
        Self::StatusChanged {
            device_id: device_id.into(),
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn command_sent(
        device_id: impl Into<String>,
        command: impl Into<String>,
        context: CommandContext,
    ) -> Self {
        Self::CommandSent {
            device_id: device_id.into(),
            command: command.into(),
            context,
            timestamp: Utc::now(),
        }
    }

    pub fn command_completed(
        device_id: impl Into<String>,
        command: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self::CommandCompleted {
            device_id: device_id.into(),
            command: command.into(),
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn command_failed(
        device_id: impl Into<String>,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            device_id: device_id.into(),
            command: command.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn inquiry_reply(device_id: impl Into<String>, query: impl Into<String>, value: Value) -> Self {
        Self::InquiryReply {
            device_id: device_id.into(),
            query: query.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::ConnectionChanged { device_id, .. }
            | Self::StatusChanged { device_id, .. }
            | Self::CommandSent { device_id, .. }
            | Self::CommandCompleted { device_id, .. }
            | Self::CommandFailed { device_id, .. }
            | Self::InquiryReply { device_id, .. } => device_id,
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ConnectionChanged { timestamp, .. } => *timestamp,
            Self::StatusChanged { timestamp, .. } => *timestamp,
            Self::CommandSent { timestamp, .. } => *timestamp,
            Self::CommandCompleted { timestamp, .. } => *timestamp,
            Self::CommandFailed { timestamp, .. } => *timestamp,
            Self::InquiryReply { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &str {
        match self {
            Self::ConnectionChanged { .. } => "ConnectionChanged",
            Self::StatusChanged { .. } => "StatusChanged",
            Self::CommandSent { .. } => "CommandSent",
            Self::CommandCompleted { .. } => "CommandCompleted",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::InquiryReply { .. } => "InquiryReply",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use serde_json::json;

    #[test]
    fn test_connection_changed_event() {
        let event = DeviceEvent::connection_changed(
            "cam1",
            ConnectionState::Disconnected,
            Some("reset by peer".into()),
        );
        assert_eq!(event.event_type(), "ConnectionChanged");
        assert_eq!(event.device_id(), "cam1");
        match event {
            DeviceEvent::ConnectionChanged { state, reason, .. } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert_eq!(reason.as_deref(), Some("reset by peer"));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_status_changed_serialization() {
        let status = DeviceStatus {
            status_code: StatusCode::Bad,
            messages: vec!["down".into()],
            status_details: vec![],
            active: true,
        };
        let event = DeviceEvent::status_changed("osc1", status);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "StatusChanged");
        assert_eq!(value["device_id"], "osc1");
        assert_eq!(value["status"]["statusCode"], "BAD");
    }

    #[test]
    fn test_inquiry_reply_event() {
        let event = DeviceEvent::inquiry_reply("cam1", "focusMode", json!("auto"));
        assert_eq!(event.event_type(), "InquiryReply");
        assert!(event.timestamp() <= Utc::now());
    }
}
