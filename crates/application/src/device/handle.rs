use std::time::Duration;

use domain::integration::ActionResponse;
use domain::status::{GenericStatus, StatusTemplates, StatusTracker};
use domain::{DeviceStatus, DeviceTimelineState, DomainError, Mappings, StatusCode, StatusDetail};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Requests a worker processes one at a time, in arrival order
#[derive(Debug)]
pub enum WorkerMessage {
    SetTargetState {
        timeline: DeviceTimelineState,
        mappings: Mappings,
    },
    ExecuteAction {
        action_id: String,
        payload: Option<Value>,
        reply: oneshot::Sender<ActionResponse>,
    },
    Connect,
    Disconnect,
}

/// Conductor-side end of a running device worker
pub struct DeviceHandle {
    device_id: String,
    device_name: String,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    status: watch::Receiver<DeviceStatus>,
    templates: StatusTemplates,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DeviceHandle {
    pub(crate) fn new(
        device_id: String,
        device_name: String,
        tx: mpsc::UnboundedSender<WorkerMessage>,
        status: watch::Receiver<DeviceStatus>,
        templates: StatusTemplates,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            device_id,
            device_name,
            tx,
            status,
            templates,
            cancel,
            task,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn send(&self, message: WorkerMessage) -> Result<(), DomainError> {
        self.tx
            .send(message)
            .map_err(|_| DomainError::WorkerUnavailable(self.device_id.clone()))
    }

    /// Queue a new target; returns as soon as the worker has it in its inbox
    pub fn set_target_state(
        &self,
        timeline: DeviceTimelineState,
        mappings: Mappings,
    ) -> Result<(), DomainError> {
        self.send(WorkerMessage::SetTargetState { timeline, mappings })
    }

    pub fn connect(&self) -> Result<(), DomainError> {
        self.send(WorkerMessage::Connect)
    }

    pub fn disconnect(&self) -> Result<(), DomainError> {
        self.send(WorkerMessage::Disconnect)
    }

    /// Hand an action to the worker; the receiver yields its response
    pub fn request_action(
        &self,
        action_id: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<oneshot::Receiver<ActionResponse>, DomainError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerMessage::ExecuteAction {
            action_id: action_id.into(),
            payload,
            reply,
        })?;
        Ok(response)
    }

    pub async fn execute_action(
        &self,
        action_id: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<ActionResponse, DomainError> {
        self.request_action(action_id, payload)?
            .await
            .map_err(|_| DomainError::WorkerUnavailable(self.device_id.clone()))
    }

    /// True while the worker task is alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Latest status the worker published. A worker that died without
    /// being shut down reports itself as crashed.
    pub fn status(&self) -> DeviceStatus {
        let status = self.status.borrow().clone();
        if self.is_running() || self.cancel.is_cancelled() {
            return status;
        }

        let mut tracker = StatusTracker::new();
        for detail in status.status_details {
            tracker.set(detail);
        }
        tracker.set(StatusDetail::new(GenericStatus::WorkerCrashed {
            device_name: self.device_name.clone(),
            reason: "worker task exited".into(),
        }));
        tracker.snapshot(StatusCode::Unknown, false, &self.templates)
    }

    /// Stop the worker and wait for it to release its connection
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let device_id = self.device_id;
        match tokio::time::timeout(SHUTDOWN_GRACE, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(device_id = %device_id, error = %e, "Device worker ended abnormally"),
            Err(_) => warn!(device_id = %device_id, "Device worker did not stop in time"),
        }
    }
}
