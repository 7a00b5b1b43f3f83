use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Worker-assigned identifier used to correlate replies with sent commands
pub type CommandToken = u64;

/// Transport and protocol failures reported by a driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl DriverError {
    /// Transport-level failures escalate the connection state;
    /// the remaining variants only concern the command at hand.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::NotConnected | Self::SendFailed(_)
        )
    }
}

/// Result of handing a command to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing more to wait for (fire-and-forget transports)
    Fulfilled,
    /// The device will answer later through a [`DriverEvent`]
    AwaitingReply,
}

/// Asynchronous notifications raised by a connected driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// The device completed the command; inquiries carry their decoded reply
    Fulfilled {
        token: CommandToken,
        reply: Option<Value>,
    },
    /// The device answered the command with an error
    Rejected { token: CommandToken, reason: String },
    /// The transport went away
    ConnectionLost { reason: String },
    /// Replies can no longer be matched to commands
    ProtocolDesync { reason: String },
}

/// Callback through which drivers report [`DriverEvent`]s to their owner
pub type DriverEventSink = Arc<dyn Fn(DriverEvent) + Send + Sync>;

/// Port every device transport implements.
///
/// `C` is the integration's command content type; the driver owns the
/// translation to its wire format.
#[async_trait]
pub trait DeviceDriver<C>: Send
where
    C: Send + Sync + 'static,
{
    /// Establish connection to the device. Replies and connection loss
    /// are reported through `events` until [`DeviceDriver::disconnect`].
    async fn connect(&mut self, events: DriverEventSink) -> Result<(), DriverError>;

    /// Disconnect from the device
    async fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Write one command to the device
    async fn send(&mut self, token: CommandToken, command: &C)
    -> Result<SendOutcome, DriverError>;

    /// The owner stopped waiting for `token`. Transports that match
    /// replies by order resynchronise here so later replies are not
    /// credited to it.
    async fn abandon(&mut self, _token: CommandToken) -> Result<(), DriverError> {
        Ok(())
    }

    /// Get driver type identifier
    fn driver_type(&self) -> &str;
}
