use async_trait::async_trait;
use tracing::info;

use domain::driver::{CommandToken, DeviceDriver, DriverError, DriverEventSink, SendOutcome};
use domain::integration::abstract_device::AbstractCommand;

/// Driver for devices without a transport: commands are logged and
/// count as fulfilled immediately.
#[derive(Debug, Default)]
pub struct AbstractDriver {
    name: String,
}

impl AbstractDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DeviceDriver<AbstractCommand> for AbstractDriver {
    async fn connect(&mut self, _events: DriverEventSink) -> Result<(), DriverError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn send(
        &mut self,
        token: CommandToken,
        command: &AbstractCommand,
    ) -> Result<SendOutcome, DriverError> {
        info!(device = %self.name, token, ?command, "Abstract command");
        Ok(SendOutcome::Fulfilled)
    }

    fn driver_type(&self) -> &str {
        "ABSTRACT"
    }
}
