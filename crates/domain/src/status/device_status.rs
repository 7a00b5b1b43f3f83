use serde::Serialize;

use super::detail::{StatusDetail, StatusTemplates};
use super::severity::StatusCode;

/// Status snapshot reported to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub status_code: StatusCode,
    pub messages: Vec<String>,
    pub status_details: Vec<StatusDetail>,
    pub active: bool,
}

impl DeviceStatus {
    pub fn is_ok(&self) -> bool {
        self.status_code.is_ok()
    }
}

/// Active status details of one device, at most one per code.
///
/// Severity is never stored; it is recomputed from the details on
/// every read.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    details: Vec<StatusDetail>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the detail with the same code.
    /// Returns true when the active set changed.
    pub fn set(&mut self, detail: StatusDetail) -> bool {
        match self.details.iter_mut().find(|d| d.code == detail.code) {
            Some(existing) if *existing == detail => false,
            Some(existing) => {
                *existing = detail;
                true
            }
            None => {
                self.details.push(detail);
                true
            }
        }
    }

    pub fn clear(&mut self, code: &str) -> bool {
        let before = self.details.len();
        self.details.retain(|d| d.code != code);
        before != self.details.len()
    }

    pub fn details(&self) -> &[StatusDetail] {
        &self.details
    }

    /// Highest active severity, or `baseline` when nothing is active
    pub fn severity(&self, baseline: StatusCode) -> StatusCode {
        self.details
            .iter()
            .map(StatusDetail::severity)
            .max()
            .unwrap_or(baseline)
    }

    pub fn snapshot(
        &self,
        baseline: StatusCode,
        active: bool,
        templates: &StatusTemplates,
    ) -> DeviceStatus {
        DeviceStatus {
            status_code: self.severity(baseline),
            messages: self.details.iter().map(|d| templates.render(d)).collect(),
            status_details: self.details.clone(),
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::GenericStatus;

    fn desync() -> StatusDetail {
        StatusDetail::new(GenericStatus::ProtocolDesync {
            device_name: "cam".into(),
            reason: "bad frame".into(),
        })
    }

    fn slow(elapsed_ms: u64) -> StatusDetail {
        StatusDetail::new(GenericStatus::CommandSlowSent {
            device_name: "cam".into(),
            command: "home".into(),
            elapsed_ms,
        })
    }

    #[test]
    fn test_empty_tracker_uses_baseline() {
        let tracker = StatusTracker::new();
        assert_eq!(tracker.severity(StatusCode::Unknown), StatusCode::Unknown);
        assert_eq!(tracker.severity(StatusCode::Good), StatusCode::Good);
    }

    #[test]
    fn test_fatal_raises_and_clear_restores() {
        let mut tracker = StatusTracker::new();
        tracker.set(slow(100));
        assert_eq!(tracker.severity(StatusCode::Good), StatusCode::WarningMinor);

        tracker.set(desync());
        assert_eq!(tracker.severity(StatusCode::Good), StatusCode::Fatal);

        assert!(tracker.clear("DEVICE_PROTOCOL_DESYNC"));
        assert_eq!(tracker.severity(StatusCode::Good), StatusCode::WarningMinor);

        assert!(tracker.clear("DEVICE_COMMAND_SLOW_SENT"));
        assert_eq!(tracker.severity(StatusCode::Good), StatusCode::Good);
        assert_eq!(tracker.severity(StatusCode::Unknown), StatusCode::Unknown);
    }

    #[test]
    fn test_set_replaces_same_code() {
        let mut tracker = StatusTracker::new();
        assert!(tracker.set(slow(100)));
        assert!(!tracker.set(slow(100)));
        assert!(tracker.set(slow(250)));
        assert_eq!(tracker.details().len(), 1);
        assert_eq!(tracker.details()[0].context["elapsedMs"], 250);
    }

    #[test]
    fn test_snapshot_renders_messages() {
        let mut tracker = StatusTracker::new();
        tracker.set(desync());
        let status = tracker.snapshot(StatusCode::Good, true, &StatusTemplates::default());
        assert_eq!(status.status_code, StatusCode::Fatal);
        assert_eq!(status.messages.len(), 1);
        assert!(status.messages[0].contains("bad frame"));
        assert!(status.active);
        assert!(!status.is_ok());
    }

    #[test]
    fn test_clear_missing_code_is_noop() {
        let mut tracker = StatusTracker::new();
        assert!(!tracker.clear("NOPE"));
    }
}
