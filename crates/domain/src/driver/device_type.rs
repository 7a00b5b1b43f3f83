use serde::{Deserialize, Serialize};

/// Device families the registry knows how to drive.
/// Each variant selects one integration (state builder, differ, driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    /// No transport; commands are only logged and published
    Abstract,
    /// VISCA pan/tilt/zoom camera
    Ptz,
    /// Open Sound Control over UDP
    Osc,
    /// Generic WebSocket client
    Websocket,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [Self::Abstract, Self::Ptz, Self::Osc, Self::Websocket];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Ptz => "ptz",
            Self::Osc => "osc",
            Self::Websocket => "websocket",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
