//! VISCA camera control protocol.
//!
//! Packets are `header, body..., 0xFF`. The header is `0x80 | address` for
//! addressed commands and `0x88` for broadcast. Replies are `y0 ... FF`
//! where `y = address + 8`.

mod codec;
mod command;
mod inquiry;
mod reply;

pub use codec::ViscaCodec;
pub use command::{
    ActuationCommand, ControlCommand, DriveDirection, FocusModeSetting, PanDirection,
    PanTiltDrive, PresetCommand, TiltDirection, ViscaCommand,
};
pub use inquiry::{InquiryCommand, InquiryReply, PowerState, ViscaFocusMode};
pub use reply::{ReplyErrorKind, ViscaReply};

pub use super::CodecError;

pub const TERMINATOR: u8 = 0xFF;
pub const BROADCAST_HEADER: u8 = 0x88;
/// Longest frame a camera sends (pan/tilt position reply)
pub const MAX_FRAME_LEN: usize = 16;

pub(crate) fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), CodecError> {
    if value < min || value > max {
        return Err(CodecError::OutOfRange { field, value, max });
    }
    Ok(())
}

/// Split a 16-bit value into four low nibbles, most significant first
pub(crate) fn to_nibbles(value: u16) -> [u8; 4] {
    [
        ((value >> 12) & 0x0F) as u8,
        ((value >> 8) & 0x0F) as u8,
        ((value >> 4) & 0x0F) as u8,
        (value & 0x0F) as u8,
    ]
}

pub(crate) fn from_nibbles(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, b| (acc << 4) | u16::from(b & 0x0F))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles() {
        assert_eq!(to_nibbles(0x4000), [4, 0, 0, 0]);
        assert_eq!(to_nibbles(0x1A2B), [1, 0xA, 2, 0xB]);
        assert_eq!(from_nibbles(&[1, 0xA, 2, 0xB]), 0x1A2B);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("speed", 7, 0, 7).is_ok());
        assert!(matches!(
            check_range("speed", 8, 0, 7),
            Err(CodecError::OutOfRange { max: 7, .. })
        ));
        assert!(check_range("speed", 0, 1, 7).is_err());
    }
}
