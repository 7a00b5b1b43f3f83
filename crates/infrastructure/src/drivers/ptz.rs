use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use domain::driver::{
    CommandToken, DeviceDriver, DriverError, DriverEvent, DriverEventSink, SendOutcome,
};
use domain::integration::ptz::{FocusMode, PtzCommand, PtzOptions, PtzQuery, PtzTransport};

use crate::protocol::CodecError;
use crate::protocol::visca::{
    ActuationCommand, ControlCommand, DriveDirection, FocusModeSetting, InquiryCommand,
    PanTiltDrive, PresetCommand, ViscaCodec, ViscaCommand, ViscaReply,
};

type BoxedStream = Box<dyn PtzStream>;

/// Anything the camera can be reached over
pub trait PtzStream: AsyncRead + AsyncWrite + Send + Sync + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> PtzStream for T {}

/// What the next reply frame on the wire belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingReply {
    Command { token: CommandToken },
    Inquiry {
        token: CommandToken,
        inquiry: InquiryCommand,
    },
    /// Session packets sent by the driver itself
    Internal,
}

type PendingQueue = Arc<Mutex<VecDeque<PendingReply>>>;

/// VISCA camera driver over TCP or RS-232.
///
/// VISCA has no transaction ids: replies arrive in send order and are
/// matched against a FIFO of outstanding packets.
pub struct PtzDriver {
    options: PtzOptions,
    writer: Option<FramedWrite<WriteHalf<BoxedStream>, ViscaCodec>>,
    reader: Option<JoinHandle<()>>,
    events: Option<DriverEventSink>,
    pending: PendingQueue,
}

impl PtzDriver {
    pub fn new(options: PtzOptions) -> Self {
        Self {
            options,
            writer: None,
            reader: None,
            events: None,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    async fn open(&self) -> Result<BoxedStream, DriverError> {
        match &self.options.transport {
            PtzTransport::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| {
                        DriverError::ConnectionFailed(format!("{}:{}: {}", host, port, e))
                    })?;
                stream.set_nodelay(true).ok();
                Ok(Box::new(stream))
            }
            PtzTransport::Serial { port, baud_rate } => {
                // Windows needs the device namespace prefix for COM10 and up
                let port_name =
                    if cfg!(target_os = "windows") && !port.to_uppercase().starts_with(r"\\.\") {
                        format!(r"\\.\{}", port)
                    } else {
                        port.clone()
                    };
                debug!(port = %port_name, baud_rate, "Opening serial port");
                let stream = tokio_serial::new(&port_name, *baud_rate)
                    .open_native_async()
                    .map_err(|e| {
                        warn!(port = %port_name, error = %e, "Failed to open serial port");
                        DriverError::ConnectionFailed(format!("{}: {}", port_name, e))
                    })?;
                Ok(Box::new(stream))
            }
        }
    }

    /// Take over an already open stream. `connect` calls this after
    /// opening the configured transport.
    pub async fn attach(
        &mut self,
        stream: BoxedStream,
        events: DriverEventSink,
    ) -> Result<(), DriverError> {
        self.teardown();

        let (read_half, write_half) = tokio::io::split(stream);
        let mut writer = FramedWrite::new(write_half, ViscaCodec::new());
        let frames = FramedRead::new(read_half, ViscaCodec::new());

        let pending = self.pending.clone();
        lock(&pending).clear();
        self.reader = Some(tokio::spawn(read_replies(frames, pending, events.clone())));
        self.events = Some(events);

        // Drop whatever a previous session left in the camera's buffers
        lock(&self.pending).push_back(PendingReply::Internal);
        let packet = ViscaCommand::Control(ControlCommand::IfClear).serialize_to(self.options.address);
        if let Err(e) = writer.send(packet).await {
            self.teardown();
            return Err(DriverError::ConnectionFailed(e.to_string()));
        }

        self.writer = Some(writer);
        Ok(())
    }

    /// Forget every outstanding packet and clear the camera's buffers.
    /// Other commands still awaiting a reply are rejected.
    async fn resync(&mut self, abandoned: CommandToken) -> Result<(), DriverError> {
        let (Some(writer), Some(events)) = (self.writer.as_mut(), self.events.as_ref()) else {
            return Err(DriverError::NotConnected);
        };
        let dropped: Vec<PendingReply> = {
            let mut pending = lock(&self.pending);
            let dropped = pending.drain(..).collect();
            pending.push_back(PendingReply::Internal);
            dropped
        };
        for entry in dropped {
            match entry {
                PendingReply::Command { token } | PendingReply::Inquiry { token, .. }
                    if token != abandoned =>
                {
                    events(DriverEvent::Rejected {
                        token,
                        reason: "session cleared after a reply timeout".into(),
                    });
                }
                _ => {}
            }
        }

        warn!(token = abandoned, "No VISCA reply, clearing camera interface");
        let packet = ViscaCommand::Control(ControlCommand::IfClear).serialize_to(self.options.address);
        writer
            .send(packet)
            .await
            .map_err(|e| DriverError::SendFailed(e.to_string()))
    }

    fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
        self.events = None;
        lock(&self.pending).clear();
    }
}

fn lock(pending: &PendingQueue) -> std::sync::MutexGuard<'_, VecDeque<PendingReply>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Translate an integration command into its VISCA packet
pub fn to_visca(command: &PtzCommand) -> Result<ViscaCommand, CodecError> {
    let drive = |speed: i8| match speed.signum() {
        1 => (DriveDirection::TeleVariable, speed.unsigned_abs()),
        -1 => (DriveDirection::WideVariable, speed.unsigned_abs()),
        _ => (DriveDirection::Stop, 0),
    };

    let actuation = match command {
        PtzCommand::Power { on } => ActuationCommand::Power { on: *on },
        PtzCommand::RecallPreset { preset } => {
            ActuationCommand::Preset(PresetCommand::recall(*preset))
        }
        PtzCommand::StorePreset { preset } => ActuationCommand::Preset(PresetCommand::set(*preset)),
        PtzCommand::Home => ActuationCommand::Home,
        PtzCommand::PanTilt { pan, tilt } => {
            ActuationCommand::PanTilt(PanTiltDrive::from_signed(*pan, *tilt)?)
        }
        PtzCommand::ZoomSpeed { speed } => {
            let (direction, speed) = drive(*speed);
            ActuationCommand::zoom(direction, speed)?
        }
        PtzCommand::ZoomPosition { position } => ActuationCommand::zoom_direct(*position)?,
        PtzCommand::FocusMode { mode } => ActuationCommand::FocusMode(match mode {
            FocusMode::Auto => FocusModeSetting::Auto,
            FocusMode::Manual => FocusModeSetting::Manual,
        }),
        PtzCommand::FocusSpeed { speed } => {
            let (direction, speed) = drive(*speed);
            ActuationCommand::focus(direction, speed)?
        }
        PtzCommand::Inquire { query } => {
            return Ok(ViscaCommand::Inquiry(match query {
                PtzQuery::Power => InquiryCommand::Power,
                PtzQuery::FocusMode => InquiryCommand::FocusMode,
                PtzQuery::ZoomPosition => InquiryCommand::ZoomPosition,
                PtzQuery::PanTiltPosition => InquiryCommand::PanTiltPosition,
            }));
        }
    };
    Ok(ViscaCommand::Actuation(actuation))
}

/// Match reply frames to outstanding packets until the stream ends
async fn read_replies(
    mut frames: FramedRead<ReadHalf<BoxedStream>, ViscaCodec>,
    pending: PendingQueue,
    events: DriverEventSink,
) {
    loop {
        let frame = match frames.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(CodecError::Io(e))) => {
                warn!(error = %e, "VISCA read failed");
                events(DriverEvent::ConnectionLost {
                    reason: e.to_string(),
                });
                return;
            }
            Some(Err(e)) => {
                error!(error = %e, "VISCA framing error");
                events(DriverEvent::ProtocolDesync {
                    reason: e.to_string(),
                });
                return;
            }
            None => {
                info!("VISCA stream closed by peer");
                events(DriverEvent::ConnectionLost {
                    reason: "connection closed by peer".into(),
                });
                return;
            }
        };

        let reply = match ViscaReply::parse(&frame) {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Unparseable VISCA reply");
                events(DriverEvent::ProtocolDesync {
                    reason: e.to_string(),
                });
                return;
            }
        };

        if let Err(reason) = dispatch_reply(&reply, &frame, &pending, &events) {
            error!(%reason, "VISCA reply does not match any outstanding packet");
            events(DriverEvent::ProtocolDesync { reason });
            return;
        }
    }
}

fn dispatch_reply(
    reply: &ViscaReply,
    frame: &[u8],
    pending: &PendingQueue,
    events: &DriverEventSink,
) -> Result<(), String> {
    match reply {
        ViscaReply::Network { payload } => {
            debug!(?payload, "VISCA network reply");
            Ok(())
        }
        ViscaReply::Ack { socket, .. } => {
            match lock(pending).front() {
                Some(PendingReply::Command { token }) => {
                    debug!(token, socket, "VISCA ack");
                    Ok(())
                }
                Some(other) => Err(format!("ack received while waiting for {:?}", other)),
                None => Err("ack with nothing outstanding".into()),
            }
        }
        ViscaReply::Completion { .. } => {
            let front = lock(pending).pop_front();
            match front {
                Some(PendingReply::Command { token }) => {
                    events(DriverEvent::Fulfilled { token, reply: None });
                    Ok(())
                }
                Some(PendingReply::Inquiry { token, inquiry }) => {
                    let decoded = inquiry
                        .deserialize_reply(frame)
                        .map_err(|e| format!("{:?} reply: {}", inquiry, e))?;
                    events(DriverEvent::Fulfilled {
                        token,
                        reply: Some(decoded.to_json()),
                    });
                    Ok(())
                }
                Some(PendingReply::Internal) => Ok(()),
                None => Err("completion with nothing outstanding".into()),
            }
        }
        ViscaReply::Error { kind, .. } => {
            let front = lock(pending).pop_front();
            match front {
                Some(PendingReply::Command { token }) | Some(PendingReply::Inquiry { token, .. }) => {
                    events(DriverEvent::Rejected {
                        token,
                        reason: kind.describe(),
                    });
                    Ok(())
                }
                Some(PendingReply::Internal) => {
                    warn!(error = %kind.describe(), "Camera rejected session command");
                    Ok(())
                }
                None => Err(format!("error {} with nothing outstanding", kind.describe())),
            }
        }
    }
}

#[async_trait]
impl DeviceDriver<PtzCommand> for PtzDriver {
    async fn connect(&mut self, events: DriverEventSink) -> Result<(), DriverError> {
        let stream = self.open().await?;
        self.attach(stream, events).await?;
        info!(device = %self.options.transport, address = self.options.address, "PTZ camera connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close().await {
                warn!(error = %e, "Error closing VISCA stream");
            }
        }
        self.teardown();
        info!(device = %self.options.transport, "PTZ camera disconnected");
        Ok(())
    }

    async fn send(
        &mut self,
        token: CommandToken,
        command: &PtzCommand,
    ) -> Result<SendOutcome, DriverError> {
        let visca = to_visca(command).map_err(|e| DriverError::InvalidCommand(e.to_string()))?;
        let writer = self.writer.as_mut().ok_or(DriverError::NotConnected)?;

        let entry = match visca.as_inquiry() {
            Some(inquiry) => PendingReply::Inquiry {
                token,
                inquiry: *inquiry,
            },
            None => PendingReply::Command { token },
        };
        // Registered before writing so a fast reply finds its entry
        lock(&self.pending).push_back(entry);

        let packet = visca.serialize_to(self.options.address);
        debug!(token, packet = ?packet, "VISCA send");
        if let Err(e) = writer.send(packet).await {
            lock(&self.pending).retain(|p| *p != entry);
            return Err(DriverError::SendFailed(e.to_string()));
        }
        Ok(SendOutcome::AwaitingReply)
    }

    async fn abandon(&mut self, token: CommandToken) -> Result<(), DriverError> {
        let outstanding = lock(&self.pending).iter().any(|entry| match entry {
            PendingReply::Command { token: t } | PendingReply::Inquiry { token: t, .. } => {
                *t == token
            }
            PendingReply::Internal => false,
        });
        // A reply that already arrived left the FIFO in step
        if !outstanding {
            return Ok(());
        }
        self.resync(token).await
    }

    fn driver_type(&self) -> &str {
        "PTZ"
    }
}

impl Drop for PtzDriver {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
