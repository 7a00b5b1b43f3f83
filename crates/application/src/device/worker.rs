use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use domain::driver::{
    CommandToken, ConnectionState, DriverEvent, DriverEventSink, ReconnectPolicy, SendOutcome,
};
use domain::event::EventPublisher;
use domain::integration::{
    ActionEffect, ActionError, ActionRegistry, ActionResponse, parse_options,
};
use domain::status::{GenericStatus, StatusTemplates, StatusTracker};
use domain::{
    Command, DeviceConfig, DeviceEvent, DeviceStatus, DeviceTimelineState, DomainError,
    Integration, Mappings, StatusCode, StatusDetail,
};
use infrastructure::BoxedDriver;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handle::{DeviceHandle, WorkerMessage};
use crate::queue::{DeadlineEvent, Dispatch, DispatchQueue};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared collaborators handed to every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub publisher: Arc<dyn EventPublisher>,
    pub templates: StatusTemplates,
}

/// Owns one device: its connection, last-sent state, dispatch queue and
/// status. Runs as its own task and is driven through a [`DeviceHandle`].
pub struct DeviceWorker<I: Integration> {
    device_id: String,
    device_name: String,
    options: I::Options,
    actions: ActionRegistry<I>,
    reconnect_policy: ReconnectPolicy,
    driver: BoxedDriver<I>,

    connection: ConnectionState,
    ever_connected: bool,
    auto_reconnect: bool,
    reconnect_attempt: u32,
    reconnect_at: Option<Instant>,
    /// Bumped per session so events from a dropped connection are ignored
    generation: u64,
    driver_tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
    driver_rx: mpsc::UnboundedReceiver<(u64, DriverEvent)>,
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,

    last_state: I::State,
    target: Option<I::State>,
    queue: DispatchQueue<I::Command>,

    status: StatusTracker,
    disconnected_code: Option<String>,
    templates: StatusTemplates,
    status_tx: watch::Sender<DeviceStatus>,
    publisher: Arc<dyn EventPublisher>,
    cancel: CancellationToken,
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".into()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<I: Integration> DeviceWorker<I> {
    /// Validate the configuration and start the worker task.
    ///
    /// Configuration errors are returned here and no task is started.
    pub fn spawn(
        device_id: &str,
        config: &DeviceConfig,
        create_driver: impl FnOnce(&I::Options) -> BoxedDriver<I>,
        context: WorkerContext,
    ) -> Result<DeviceHandle, DomainError> {
        if device_id.trim().is_empty() {
            return Err(DomainError::InvalidDeviceId(device_id.to_string()));
        }
        if config.device_type != I::DEVICE_TYPE {
            return Err(DomainError::InvalidConfiguration(format!(
                "{} is configured as {} but registered as {}",
                device_id,
                config.device_type,
                I::DEVICE_TYPE
            )));
        }
        let options = parse_options::<I>(&config.options)?;
        I::validate_options(&options)?;

        let device_name = I::device_name(device_id, &options);
        let (tx, inbox) = mpsc::unbounded_channel();
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let status = StatusTracker::new();
        let (status_tx, status_rx) = watch::channel(status.snapshot(
            StatusCode::Unknown,
            true,
            &context.templates,
        ));
        let cancel = CancellationToken::new();

        let worker = Self {
            device_id: device_id.to_string(),
            device_name: device_name.clone(),
            actions: I::actions(),
            reconnect_policy: I::reconnect_policy(&options),
            driver: create_driver(&options),
            connection: ConnectionState::Disconnected,
            ever_connected: false,
            auto_reconnect: true,
            reconnect_attempt: 0,
            reconnect_at: None,
            generation: 0,
            driver_tx,
            driver_rx,
            inbox,
            last_state: I::State::default(),
            target: None,
            queue: DispatchQueue::new(I::execution_mode(&options), config.timeouts()),
            status,
            disconnected_code: I::disconnected_status(device_id, &options, None)
                .map(|detail| detail.code),
            templates: context.templates.clone(),
            status_tx,
            publisher: context.publisher,
            cancel: cancel.clone(),
            options,
        };

        let task = tokio::spawn(worker.run());
        Ok(DeviceHandle::new(
            device_id.to_string(),
            device_name,
            tx,
            status_rx,
            context.templates,
            cancel,
            task,
        ))
    }

    async fn run(mut self) {
        info!(
            device_id = %self.device_id,
            device = %self.device_name,
            mode = self.queue.mode().as_str(),
            "Starting device worker"
        );

        self.connect().await;
        self.refresh_status().await;

        loop {
            let deadline = self.queue.next_deadline();
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(device_id = %self.device_id, "Shutdown signal received");
                    break;
                }
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                Some((generation, event)) = self.driver_rx.recv() => {
                    if generation == self.generation {
                        self.handle_driver_event(event).await;
                    } else {
                        debug!(device_id = %self.device_id, ?event, "Event from a previous session ignored");
                    }
                }
                _ = sleep_until(deadline) => self.handle_deadlines().await,
                _ = sleep_until(reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
            }

            self.refresh_status().await;
        }

        self.close_connection("worker stopped").await;
        let final_status = self
            .status
            .snapshot(self.baseline(), false, &self.templates);
        self.status_tx.send_replace(final_status);
        info!(device_id = %self.device_id, "Device worker stopped");
    }

    async fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::SetTargetState { timeline, mappings } => {
                self.set_target_state(&timeline, &mappings).await
            }
            WorkerMessage::ExecuteAction {
                action_id,
                payload,
                reply,
            } => {
                let response = self.execute_action(&action_id, payload.as_ref()).await;
                let _ = reply.send(response);
            }
            WorkerMessage::Connect => self.connect().await,
            WorkerMessage::Disconnect => self.disconnect().await,
        }
    }

    // --- Target state ---

    async fn set_target_state(&mut self, timeline: &DeviceTimelineState, mappings: &Mappings) {
        let built = catch_unwind(AssertUnwindSafe(|| I::build_state(timeline, mappings)));
        let state = match built {
            Ok(state) => state,
            Err(payload) => {
                self.report_crash("building device state", payload);
                return;
            }
        };

        self.status.clear("DEVICE_WORKER_CRASHED");
        self.target = Some(state);
        if self.connection.is_connected() {
            self.apply_target().await;
        } else {
            debug!(device_id = %self.device_id, time = timeline.time, "Target stored until connected");
        }
    }

    /// Diff the stored target against the last-sent state and enqueue the result
    async fn apply_target(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };
        let diffed = catch_unwind(AssertUnwindSafe(|| {
            I::diff_states(&self.last_state, &target)
        }));
        let commands = match diffed {
            Ok(commands) => commands,
            Err(payload) => {
                self.report_crash("diffing device state", payload);
                return;
            }
        };

        self.status.clear("DEVICE_WORKER_CRASHED");
        self.last_state = target;
        if commands.is_empty() {
            return;
        }

        debug!(device_id = %self.device_id, count = commands.len(), "Enqueueing commands");
        let now = Instant::now();
        for command in commands {
            self.queue.enqueue(command, now);
        }
        self.pump().await;
    }

    fn report_crash(&mut self, stage: &str, payload: Box<dyn Any + Send>) {
        let reason = format!("panic while {}: {}", stage, panic_reason(payload));
        error!(device_id = %self.device_id, %reason, "Device integration failed");
        self.status.set(StatusDetail::new(GenericStatus::WorkerCrashed {
            device_name: self.device_name.clone(),
            reason,
        }));
    }

    // --- Sending ---

    /// Send everything the queue releases until it blocks or the link drops
    async fn pump(&mut self) {
        while self.connection.can_send() {
            let batch = self.queue.pop_ready(Instant::now());
            if batch.is_empty() {
                break;
            }
            for dispatch in batch {
                if !self.send(dispatch).await {
                    return;
                }
            }
        }
    }

    /// Returns false when the connection was lost
    async fn send(&mut self, dispatch: Dispatch<I::Command>) -> bool {
        let description = I::describe(dispatch.command.content());

        if dispatch.slow_sent {
            warn!(
                device_id = %self.device_id,
                command = %description,
                waited_ms = dispatch.waited.as_millis() as u64,
                "Command sent late"
            );
            self.status.set(StatusDetail::new(GenericStatus::CommandSlowSent {
                device_name: self.device_name.clone(),
                command: description.clone(),
                elapsed_ms: dispatch.waited.as_millis() as u64,
            }));
        }

        debug!(device_id = %self.device_id, token = dispatch.token, command = %description, "Sending command");
        self.publish(DeviceEvent::command_sent(
            &self.device_id,
            &description,
            dispatch.command.context().clone(),
        ))
        .await;

        match self
            .driver
            .send(dispatch.token, dispatch.command.content())
            .await
        {
            Ok(SendOutcome::Fulfilled) => {
                self.on_fulfilled(dispatch.token, None).await;
                true
            }
            Ok(SendOutcome::AwaitingReply) => true,
            Err(e) if e.is_transport() => {
                self.on_connection_lost(e.to_string()).await;
                false
            }
            Err(e) => {
                self.on_rejected(dispatch.token, e.to_string()).await;
                true
            }
        }
    }

    fn clear_command_details(&mut self) {
        for code in GenericStatus::COMMAND_CODES {
            self.status.clear(code);
        }
    }

    async fn on_fulfilled(&mut self, token: CommandToken, reply: Option<Value>) {
        let Some(resolved) = self.queue.resolve(token, Instant::now()) else {
            debug!(device_id = %self.device_id, token, "Reply for unknown command ignored");
            return;
        };
        let description = I::describe(resolved.command.content());
        let elapsed_ms = resolved.elapsed.as_millis() as u64;

        if resolved.slow {
            warn!(device_id = %self.device_id, command = %description, elapsed_ms, "Command fulfilled late");
            self.status.set(StatusDetail::new(GenericStatus::CommandSlowFulfilled {
                device_name: self.device_name.clone(),
                command: description.clone(),
                elapsed_ms,
            }));
        } else {
            self.clear_command_details();
        }

        self.publish(DeviceEvent::command_completed(
            &self.device_id,
            &description,
            elapsed_ms,
        ))
        .await;

        if let Some(reply) = reply {
            let query = reply
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or(description.as_str())
                .to_string();
            let value = reply.get("value").cloned().unwrap_or(reply);
            info!(device_id = %self.device_id, %query, %value, "Inquiry reply");
            self.publish(DeviceEvent::inquiry_reply(&self.device_id, query, value))
                .await;
        }
    }

    async fn on_rejected(&mut self, token: CommandToken, reason: String) {
        let Some(resolved) = self.queue.resolve(token, Instant::now()) else {
            debug!(device_id = %self.device_id, token, "Rejection for unknown command ignored");
            return;
        };
        let description = I::describe(resolved.command.content());

        warn!(device_id = %self.device_id, command = %description, %reason, "Command rejected");
        self.status.set(StatusDetail::new(GenericStatus::CommandRejected {
            device_name: self.device_name.clone(),
            command: description.clone(),
            reason: reason.clone(),
        }));
        self.publish(DeviceEvent::command_failed(&self.device_id, description, reason))
            .await;
    }

    async fn handle_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Fulfilled { token, reply } => {
                self.on_fulfilled(token, reply).await;
                self.pump().await;
            }
            DriverEvent::Rejected { token, reason } => {
                self.on_rejected(token, reason).await;
                self.pump().await;
            }
            DriverEvent::ConnectionLost { reason } => self.on_connection_lost(reason).await,
            DriverEvent::ProtocolDesync { reason } => self.on_protocol_desync(reason).await,
        }
    }

    async fn handle_deadlines(&mut self) {
        for event in self.queue.poll_deadlines(Instant::now()) {
            match event {
                DeadlineEvent::SlowFulfilled {
                    token,
                    command,
                    elapsed,
                } => {
                    let description = I::describe(command.content());
                    let elapsed_ms = elapsed.as_millis() as u64;
                    warn!(device_id = %self.device_id, token, command = %description, elapsed_ms, "Command still awaiting reply");
                    self.status.set(StatusDetail::new(GenericStatus::CommandSlowFulfilled {
                        device_name: self.device_name.clone(),
                        command: description,
                        elapsed_ms,
                    }));
                }
                DeadlineEvent::TimedOut {
                    token,
                    command,
                    timeout,
                } => {
                    let description = I::describe(command.content());
                    let timeout_ms = timeout.as_millis() as u64;
                    warn!(device_id = %self.device_id, token, command = %description, timeout_ms, "Command timed out");
                    self.status.set(StatusDetail::new(GenericStatus::CommandTimeout {
                        device_name: self.device_name.clone(),
                        command: description.clone(),
                        timeout_ms,
                    }));
                    self.publish(DeviceEvent::command_failed(
                        &self.device_id,
                        description,
                        format!("no reply within {} ms", timeout_ms),
                    ))
                    .await;

                    match self.driver.abandon(token).await {
                        Ok(()) => {}
                        Err(e) if e.is_transport() => {
                            self.on_connection_lost(e.to_string()).await;
                            return;
                        }
                        Err(e) => {
                            debug!(device_id = %self.device_id, token, error = %e, "Driver could not drop timed out command")
                        }
                    }
                }
            }
        }
        self.pump().await;
    }

    // --- Connection lifecycle ---

    async fn set_connection(&mut self, state: ConnectionState, reason: Option<String>) {
        let next = match state {
            ConnectionState::Connecting => self.connection.to_connecting(),
            ConnectionState::Connected => self.connection.to_connected(),
            ConnectionState::Closing => self.connection.to_closing(),
            ConnectionState::Disconnected => Ok(self.connection.to_disconnected()),
        };
        let next = match next {
            Ok(next) if next != self.connection => next,
            Ok(_) => return,
            Err(e) => {
                error!(device_id = %self.device_id, from = %self.connection, to = %state, "{}", e);
                return;
            }
        };
        self.connection = next;
        self.publish(DeviceEvent::connection_changed(&self.device_id, next, reason))
            .await;
    }

    fn raise_disconnected(&mut self, reason: &str) {
        if let Some(detail) = I::disconnected_status(&self.device_id, &self.options, Some(reason)) {
            self.status.set(detail);
        }
    }

    /// No-op unless disconnected
    async fn connect(&mut self) {
        if !self.connection.can_connect() {
            return;
        }
        self.auto_reconnect = true;
        self.reconnect_at = None;
        self.set_connection(ConnectionState::Connecting, None).await;

        self.generation += 1;
        let generation = self.generation;
        let tx = self.driver_tx.clone();
        let events: DriverEventSink = Arc::new(move |event| {
            let _ = tx.send((generation, event));
        });

        let result = match tokio::time::timeout(CONNECT_TIMEOUT, self.driver.connect(events)).await
        {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("no connection after {} s", CONNECT_TIMEOUT.as_secs())),
        };

        match result {
            Ok(()) => self.on_connected().await,
            Err(reason) => {
                warn!(
                    device_id = %self.device_id,
                    attempt = self.reconnect_attempt,
                    %reason,
                    "Failed to connect"
                );
                self.set_connection(ConnectionState::Disconnected, Some(reason.clone()))
                    .await;
                self.raise_disconnected(&reason);
                self.schedule_reconnect();
            }
        }
    }

    async fn on_connected(&mut self) {
        info!(device_id = %self.device_id, driver = self.driver.driver_type(), "Device connected");
        self.set_connection(ConnectionState::Connected, None).await;
        self.ever_connected = true;
        self.reconnect_attempt = 0;

        if let Some(code) = &self.disconnected_code {
            self.status.clear(code);
        }
        self.status.clear("DEVICE_PROTOCOL_DESYNC");
        self.clear_command_details();

        // The device may have changed while we were away
        self.last_state = I::State::default();
        self.apply_target().await;
    }

    fn schedule_reconnect(&mut self) {
        if !self.auto_reconnect || !I::CAN_CONNECT {
            return;
        }
        let delay = self.reconnect_policy.delay_for(self.reconnect_attempt);
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        self.reconnect_at = Some(Instant::now() + delay);
        debug!(device_id = %self.device_id, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    /// Tear down the session and forget what the device was told
    async fn drop_session(&mut self, reason: &str) {
        self.generation += 1;
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(device_id = %self.device_id, dropped, "Pending commands discarded");
        }
        if let Err(e) = self.driver.disconnect().await {
            debug!(device_id = %self.device_id, error = %e, "Driver disconnect failed");
        }
        self.last_state = I::State::default();
        self.clear_command_details();
        self.set_connection(ConnectionState::Disconnected, Some(reason.to_string()))
            .await;
    }

    async fn on_connection_lost(&mut self, reason: String) {
        if !self.connection.is_connected() {
            return;
        }
        warn!(device_id = %self.device_id, %reason, "Connection lost");
        self.drop_session(&reason).await;
        self.raise_disconnected(&reason);
        self.schedule_reconnect();
    }

    async fn on_protocol_desync(&mut self, reason: String) {
        error!(device_id = %self.device_id, %reason, "Protocol desync, manual reconnect required");
        self.drop_session(&reason).await;
        self.auto_reconnect = false;
        self.reconnect_at = None;
        self.status.set(StatusDetail::new(GenericStatus::ProtocolDesync {
            device_name: self.device_name.clone(),
            reason,
        }));
    }

    /// Stop auto-reconnecting and close the link; no-op when already closed
    async fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.reconnect_at = None;
        self.close_connection("disconnected by host").await;
    }

    async fn close_connection(&mut self, reason: &str) {
        if self.connection == ConnectionState::Disconnected {
            return;
        }
        self.set_connection(ConnectionState::Closing, None).await;
        self.drop_session(reason).await;
        info!(device_id = %self.device_id, %reason, "Device disconnected");
        if I::CAN_CONNECT {
            self.raise_disconnected(reason);
        }
    }

    // --- Actions ---

    async fn execute_action(&mut self, action_id: &str, payload: Option<&Value>) -> ActionResponse {
        let effect = match self.actions.execute(action_id, &self.options, payload) {
            Ok(effect) => effect,
            Err(e) => {
                warn!(device_id = %self.device_id, action = action_id, error = %e, "Action failed");
                return ActionResponse::error(e.to_string());
            }
        };
        info!(device_id = %self.device_id, action = action_id, "Executing action");

        match effect {
            ActionEffect::Enqueue(commands) => {
                if !self.connection.is_connected() {
                    return ActionResponse::error(
                        ActionError::Unavailable(self.device_name.clone()).to_string(),
                    );
                }
                self.enqueue_all(commands).await;
            }
            ActionEffect::ResyncState => {
                self.last_state = I::State::default();
                if self.connection.is_connected() {
                    self.apply_target().await;
                }
            }
            ActionEffect::Reconnect => {
                self.disconnect().await;
                self.connect().await;
            }
            ActionEffect::None => {}
        }
        ActionResponse::ok()
    }

    async fn enqueue_all(&mut self, commands: Vec<Command<I::Command>>) {
        let now = Instant::now();
        for command in commands {
            self.queue.enqueue(command, now);
        }
        self.pump().await;
    }

    // --- Status ---

    fn baseline(&self) -> StatusCode {
        if self.ever_connected {
            StatusCode::Good
        } else {
            StatusCode::Unknown
        }
    }

    async fn refresh_status(&mut self) {
        let snapshot = self
            .status
            .snapshot(self.baseline(), true, &self.templates);
        if *self.status_tx.borrow() == snapshot {
            return;
        }
        debug!(device_id = %self.device_id, status = %snapshot.status_code, "Status changed");
        self.status_tx.send_replace(snapshot.clone());
        self.publish(DeviceEvent::status_changed(&self.device_id, snapshot))
            .await;
    }

    async fn publish(&mut self, event: DeviceEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!(device_id = %self.device_id, error = %e, "Failed to publish event");
        }
    }
}
