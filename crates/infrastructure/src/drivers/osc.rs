use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use domain::driver::{CommandToken, DeviceDriver, DriverError, DriverEventSink, SendOutcome};
use domain::integration::osc::{OscMessage, OscOptions};

use crate::protocol::osc::encode_message;

/// OSC over UDP. Datagrams are fire-and-forget, so every send that
/// reaches the socket counts as fulfilled.
pub struct OscDriver {
    options: OscOptions,
    socket: Option<UdpSocket>,
}

impl OscDriver {
    pub fn new(options: OscOptions) -> Self {
        Self {
            options,
            socket: None,
        }
    }
}

#[async_trait]
impl DeviceDriver<OscMessage> for OscDriver {
    async fn connect(&mut self, _events: DriverEventSink) -> Result<(), DriverError> {
        let target = format!("{}:{}", self.options.host, self.options.port);
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DriverError::ConnectionFailed(format!("bind: {}", e)))?;
        socket.connect(&target).await.map_err(|e| {
            warn!(target_addr = %target, error = %e, "Failed to resolve OSC target");
            DriverError::ConnectionFailed(format!("{}: {}", target, e))
        })?;

        info!(target_addr = %target, "OSC socket ready");
        self.socket = Some(socket);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.socket = None;
        Ok(())
    }

    async fn send(
        &mut self,
        token: CommandToken,
        command: &OscMessage,
    ) -> Result<SendOutcome, DriverError> {
        let socket = self.socket.as_ref().ok_or(DriverError::NotConnected)?;
        let datagram = encode_message(&command.path, &command.values)
            .map_err(|e| DriverError::InvalidCommand(e.to_string()))?;

        socket
            .send(&datagram)
            .await
            .map_err(|e| DriverError::SendFailed(e.to_string()))?;
        debug!(token, path = %command.path, bytes = datagram.len(), "OSC sent");
        Ok(SendOutcome::Fulfilled)
    }

    fn driver_type(&self) -> &str {
        "OSC"
    }
}
