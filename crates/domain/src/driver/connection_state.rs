use serde::{Deserialize, Serialize};

/// Connection state of a device worker's transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// Not connected, no active connection attempt
    #[default]
    Disconnected,
    /// Currently attempting to establish connection
    Connecting,
    /// Successfully connected; commands may be sent
    Connected,
    /// Tearing the connection down
    Closing,
}

impl ConnectionState {
    /// Check if state allows connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Check if commands may be written to the transport
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    /// Transition to closing state
    pub fn to_closing(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connected | Self::Connecting => Ok(Self::Closing),
            _ => Err("Can only close from Connected or Connecting state"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
