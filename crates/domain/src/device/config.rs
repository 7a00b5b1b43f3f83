use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::DeviceType;

fn default_reply_timeout_ms() -> u64 {
    5000
}

/// One configured physical device.
/// The integration interprets `options`; the worker reads the timing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_type: DeviceType,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub slow_sent_threshold_ms: Option<u64>,
    #[serde(default)]
    pub slow_fulfilled_threshold_ms: Option<u64>,
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

impl DeviceConfig {
    pub fn new(device_type: DeviceType, options: Value) -> Self {
        Self {
            device_type,
            options,
            disable: false,
            slow_sent_threshold_ms: None,
            slow_fulfilled_threshold_ms: None,
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }

    pub fn with_slow_thresholds(mut self, sent_ms: Option<u64>, fulfilled_ms: Option<u64>) -> Self {
        self.slow_sent_threshold_ms = sent_ms;
        self.slow_fulfilled_threshold_ms = fulfilled_ms;
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout_ms: u64) -> Self {
        self.reply_timeout_ms = reply_timeout_ms;
        self
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            slow_sent: self.slow_sent_threshold_ms.map(Duration::from_millis),
            slow_fulfilled: self.slow_fulfilled_threshold_ms.map(Duration::from_millis),
            // 0 disables the reply timeout
            reply_timeout: (self.reply_timeout_ms > 0)
                .then(|| Duration::from_millis(self.reply_timeout_ms)),
        }
    }
}

/// Per-command deadlines of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeoutPolicy {
    /// Warn when a command waits longer than this before being sent
    pub slow_sent: Option<Duration>,
    /// Warn when a sent command is not fulfilled within this
    pub slow_fulfilled: Option<Duration>,
    /// Give up waiting for a reply and free the slot
    pub reply_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_config_defaults() {
        let config: DeviceConfig = serde_json::from_value(json!({
            "device_type": "ptz",
            "options": {"address": 1}
        }))
        .unwrap();

        assert_eq!(config.device_type, DeviceType::Ptz);
        assert!(!config.disable);
        assert_eq!(config.reply_timeout_ms, 5000);
        assert_eq!(config.options["address"], 1);
    }

    #[test]
    fn test_timeout_policy() {
        let policy = DeviceConfig::new(DeviceType::Osc, Value::Null)
            .with_slow_thresholds(Some(20), None)
            .timeouts();
        assert_eq!(policy.slow_sent, Some(Duration::from_millis(20)));
        assert_eq!(policy.slow_fulfilled, None);
        assert_eq!(policy.reply_timeout, Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_zero_reply_timeout_disables() {
        let policy = DeviceConfig::new(DeviceType::Osc, Value::Null)
            .with_reply_timeout(0)
            .timeouts();
        assert_eq!(policy.reply_timeout, None);
    }
}
