use serde::Serialize;
use serde_json::Value;

use super::{CodecError, TERMINATOR, from_nibbles};

/// Inquiry packets, `8x 09 ... FF`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryCommand {
    Power,
    FocusMode,
    ZoomPosition,
    PanTiltPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    On,
    Off,
    Other(u8),
}

/// Focus mode as reported by the camera. Unknown codes pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViscaFocusMode {
    Auto,
    Manual,
    Other(u8),
}

impl ViscaFocusMode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x02 => Self::Auto,
            0x03 => Self::Manual,
            other => Self::Other(other),
        }
    }

    /// Raw protocol value
    pub fn value(&self) -> u8 {
        match self {
            Self::Auto => 0x02,
            Self::Manual => 0x03,
            Self::Other(byte) => *byte,
        }
    }
}

/// Decoded completion payload of an inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "query", content = "value", rename_all = "camelCase")]
pub enum InquiryReply {
    Power(PowerState),
    FocusMode(ViscaFocusMode),
    ZoomPosition(u16),
    PanTiltPosition { pan: i16, tilt: i16 },
}

impl InquiryReply {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl InquiryCommand {
    pub(crate) fn write_body(&self, packet: &mut Vec<u8>) {
        match self {
            Self::Power => packet.extend_from_slice(&[0x09, 0x04, 0x00]),
            Self::FocusMode => packet.extend_from_slice(&[0x09, 0x04, 0x38]),
            Self::ZoomPosition => packet.extend_from_slice(&[0x09, 0x04, 0x47]),
            Self::PanTiltPosition => packet.extend_from_slice(&[0x09, 0x06, 0x12]),
        }
    }

    /// Total frame length of the completion reply, terminator included
    pub fn reply_len(&self) -> usize {
        match self {
            Self::Power | Self::FocusMode => 4,
            Self::ZoomPosition => 7,
            Self::PanTiltPosition => 11,
        }
    }

    /// Decode a full completion frame (`y0 50 ... FF`).
    ///
    /// Values are read at fixed offsets; the payload starts at offset 2.
    pub fn deserialize_reply(&self, frame: &[u8]) -> Result<InquiryReply, CodecError> {
        if frame.len() != self.reply_len() {
            return Err(CodecError::Malformed(format!(
                "{:?} reply must be {} bytes, got {}",
                self,
                self.reply_len(),
                frame.len()
            )));
        }
        if frame[1] & 0xF0 != 0x50 || frame[frame.len() - 1] != TERMINATOR {
            return Err(CodecError::Malformed(format!(
                "not a completion frame: {:02X?}",
                frame
            )));
        }

        let reply = match self {
            Self::Power => InquiryReply::Power(match frame[2] {
                0x02 => PowerState::On,
                0x03 => PowerState::Off,
                other => PowerState::Other(other),
            }),
            Self::FocusMode => InquiryReply::FocusMode(ViscaFocusMode::from_byte(frame[2])),
            Self::ZoomPosition => InquiryReply::ZoomPosition(from_nibbles(&frame[2..6])),
            Self::PanTiltPosition => InquiryReply::PanTiltPosition {
                pan: from_nibbles(&frame[2..6]) as i16,
                tilt: from_nibbles(&frame[6..10]) as i16,
            },
        };
        Ok(reply)
    }
}
