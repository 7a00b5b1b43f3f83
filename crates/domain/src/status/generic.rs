use serde_json::{Map, Value, json};

use super::detail::{StatusCatalog, context_map, private};
use super::severity::StatusCode;

/// Codes every integration can raise, independent of its protocol
#[derive(Debug, Clone, PartialEq)]
pub enum GenericStatus {
    CommandRejected {
        device_name: String,
        command: String,
        reason: String,
    },
    CommandSlowSent {
        device_name: String,
        command: String,
        elapsed_ms: u64,
    },
    CommandSlowFulfilled {
        device_name: String,
        command: String,
        elapsed_ms: u64,
    },
    CommandTimeout {
        device_name: String,
        command: String,
        timeout_ms: u64,
    },
    ProtocolDesync {
        device_name: String,
        reason: String,
    },
    WorkerCrashed {
        device_name: String,
        reason: String,
    },
}

impl GenericStatus {
    /// Codes that describe a single command rather than the connection
    pub const COMMAND_CODES: [&'static str; 4] = [
        "DEVICE_COMMAND_REJECTED",
        "DEVICE_COMMAND_SLOW_SENT",
        "DEVICE_COMMAND_SLOW_FULFILLED",
        "DEVICE_COMMAND_TIMEOUT",
    ];
}

impl private::Sealed for GenericStatus {}

impl StatusCatalog for GenericStatus {
    fn code(&self) -> &'static str {
        match self {
            Self::CommandRejected { .. } => "DEVICE_COMMAND_REJECTED",
            Self::CommandSlowSent { .. } => "DEVICE_COMMAND_SLOW_SENT",
            Self::CommandSlowFulfilled { .. } => "DEVICE_COMMAND_SLOW_FULFILLED",
            Self::CommandTimeout { .. } => "DEVICE_COMMAND_TIMEOUT",
            Self::ProtocolDesync { .. } => "DEVICE_PROTOCOL_DESYNC",
            Self::WorkerCrashed { .. } => "DEVICE_WORKER_CRASHED",
        }
    }

    fn severity(&self) -> StatusCode {
        match self {
            Self::CommandRejected { .. } => StatusCode::WarningMajor,
            Self::CommandSlowSent { .. } => StatusCode::WarningMinor,
            Self::CommandSlowFulfilled { .. } => StatusCode::WarningMinor,
            Self::CommandTimeout { .. } => StatusCode::WarningMajor,
            Self::ProtocolDesync { .. } => StatusCode::Fatal,
            Self::WorkerCrashed { .. } => StatusCode::Fatal,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::CommandRejected { .. } => "{{deviceName}}: command {{command}} rejected ({{reason}})",
            Self::CommandSlowSent { .. } => {
                "{{deviceName}}: command {{command}} was sent {{elapsedMs}} ms late"
            }
            Self::CommandSlowFulfilled { .. } => {
                "{{deviceName}}: command {{command}} took {{elapsedMs}} ms to complete"
            }
            Self::CommandTimeout { .. } => {
                "{{deviceName}}: no reply to {{command}} within {{timeoutMs}} ms"
            }
            Self::ProtocolDesync { .. } => {
                "{{deviceName}}: protocol out of sync ({{reason}}), reconnect required"
            }
            Self::WorkerCrashed { .. } => "{{deviceName}}: device worker stopped ({{reason}})",
        }
    }

    fn context(&self) -> Map<String, Value> {
        context_map(match self {
            Self::CommandRejected {
                device_name,
                command,
                reason,
            } => json!({"deviceName": device_name, "command": command, "reason": reason}),
            Self::CommandSlowSent {
                device_name,
                command,
                elapsed_ms,
            }
            | Self::CommandSlowFulfilled {
                device_name,
                command,
                elapsed_ms,
            } => json!({"deviceName": device_name, "command": command, "elapsedMs": elapsed_ms}),
            Self::CommandTimeout {
                device_name,
                command,
                timeout_ms,
            } => json!({"deviceName": device_name, "command": command, "timeoutMs": timeout_ms}),
            Self::ProtocolDesync {
                device_name,
                reason,
            }
            | Self::WorkerCrashed {
                device_name,
                reason,
            } => json!({"deviceName": device_name, "reason": reason}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusDetail;

    #[test]
    fn test_timeout_detail() {
        let detail = StatusDetail::new(GenericStatus::CommandTimeout {
            device_name: "cam1".into(),
            command: "zoom direct".into(),
            timeout_ms: 5000,
        });
        assert_eq!(detail.code, "DEVICE_COMMAND_TIMEOUT");
        assert_eq!(detail.severity(), StatusCode::WarningMajor);
        assert_eq!(
            detail.message(),
            "cam1: no reply to zoom direct within 5000 ms"
        );
    }

    #[test]
    fn test_desync_is_fatal() {
        let detail = StatusDetail::new(GenericStatus::ProtocolDesync {
            device_name: "cam1".into(),
            reason: "unexpected completion".into(),
        });
        assert_eq!(detail.severity(), StatusCode::Fatal);
        assert!(!GenericStatus::COMMAND_CODES.contains(&detail.code.as_str()));
    }

    #[test]
    fn test_slow_codes_are_minor() {
        let sent = GenericStatus::CommandSlowSent {
            device_name: "d".into(),
            command: "c".into(),
            elapsed_ms: 10,
        };
        let fulfilled = GenericStatus::CommandSlowFulfilled {
            device_name: "d".into(),
            command: "c".into(),
            elapsed_ms: 10,
        };
        assert_eq!(sent.severity(), StatusCode::WarningMinor);
        assert_eq!(fulfilled.severity(), StatusCode::WarningMinor);
        assert_eq!(sent.context()["elapsedMs"], 10);
    }
}
