use super::inquiry::InquiryCommand;
use super::{BROADCAST_HEADER, CodecError, TERMINATOR, check_range, to_nibbles};

/// Any VISCA packet the driver can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViscaCommand {
    /// Session management, no camera motion
    Control(ControlCommand),
    /// Fire-and-forget: acknowledged, then completed, no payload
    Actuation(ActuationCommand),
    /// Request with a typed reply
    Inquiry(InquiryCommand),
}

impl ViscaCommand {
    /// Serialize for camera address 1
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_to(1)
    }

    pub fn serialize_to(&self, address: u8) -> Vec<u8> {
        let header = match self {
            Self::Control(ControlCommand::AddressSet) => BROADCAST_HEADER,
            _ => 0x80 | (address & 0x07),
        };
        let mut packet = Vec::with_capacity(16);
        packet.push(header);
        match self {
            Self::Control(cmd) => cmd.write_body(&mut packet),
            Self::Actuation(cmd) => cmd.write_body(&mut packet),
            Self::Inquiry(cmd) => cmd.write_body(&mut packet),
        }
        packet.push(TERMINATOR);
        packet
    }

    /// Reply decoder, present only for inquiries
    pub fn as_inquiry(&self) -> Option<&InquiryCommand> {
        match self {
            Self::Inquiry(inquiry) => Some(inquiry),
            _ => None,
        }
    }

    /// Whether the camera answers this packet on the addressed channel
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Self::Control(ControlCommand::AddressSet))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Broadcast address assignment, `88 30 01 FF`
    AddressSet,
    /// Clear command buffers, `8x 01 00 01 FF`
    IfClear,
    /// Cancel the command running in `socket`, `8x 2s FF`
    Cancel { socket: u8 },
}

impl ControlCommand {
    pub fn cancel(socket: u8) -> Result<Self, CodecError> {
        check_range("socket", u32::from(socket), 1, 2)?;
        Ok(Self::Cancel { socket })
    }

    fn write_body(&self, packet: &mut Vec<u8>) {
        match self {
            Self::AddressSet => packet.extend_from_slice(&[0x30, 0x01]),
            Self::IfClear => packet.extend_from_slice(&[0x01, 0x00, 0x01]),
            Self::Cancel { socket } => packet.push(0x20 | (socket & 0x0F)),
        }
    }
}

/// Signed drive for zoom and focus.
///
/// Values above `VARIABLE_THRESHOLD` carry a speed in their low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriveDirection {
    Stop = 0x00,
    /// Tele / far at standard speed
    TeleStandard = 0x02,
    /// Wide / near at standard speed
    WideStandard = 0x03,
    TeleVariable = 0x20,
    WideVariable = 0x30,
}

impl DriveDirection {
    pub const VARIABLE_THRESHOLD: u8 = 0x10;
    pub const MAX_SPEED: u8 = 7;

    /// Pack direction and speed into one byte
    pub fn pack(self, speed: u8) -> u8 {
        let direction = self as u8;
        if direction > Self::VARIABLE_THRESHOLD {
            direction + speed
        } else {
            direction
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PanDirection {
    Left = 0x01,
    Right = 0x02,
    Stop = 0x03,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TiltDirection {
    Up = 0x01,
    Down = 0x02,
    Stop = 0x03,
}

/// Preset memory operation. Operation 0 resets, 1 sets, 2 recalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetCommand {
    operation: u8,
    memory: u8,
}

impl PresetCommand {
    pub const RESET: u8 = 0;
    pub const SET: u8 = 1;
    pub const RECALL: u8 = 2;

    pub fn new(operation: u8, memory: u8) -> Result<Self, CodecError> {
        check_range("preset operation", u32::from(operation), 0, 2)?;
        Ok(Self { operation, memory })
    }

    pub fn recall(memory: u8) -> Self {
        Self {
            operation: Self::RECALL,
            memory,
        }
    }

    pub fn set(memory: u8) -> Self {
        Self {
            operation: Self::SET,
            memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanTiltDrive {
    pan_speed: u8,
    tilt_speed: u8,
    pan: PanDirection,
    tilt: TiltDirection,
}

impl PanTiltDrive {
    pub const MAX_PAN_SPEED: u8 = 0x18;
    pub const MAX_TILT_SPEED: u8 = 0x17;

    pub fn new(
        pan_speed: u8,
        tilt_speed: u8,
        pan: PanDirection,
        tilt: TiltDirection,
    ) -> Result<Self, CodecError> {
        check_range("pan speed", u32::from(pan_speed), 1, u32::from(Self::MAX_PAN_SPEED))?;
        check_range(
            "tilt speed",
            u32::from(tilt_speed),
            1,
            u32::from(Self::MAX_TILT_SPEED),
        )?;
        Ok(Self {
            pan_speed,
            tilt_speed,
            pan,
            tilt,
        })
    }

    /// Build from signed speeds: negative pans left / tilts down
    pub fn from_signed(pan: i8, tilt: i8) -> Result<Self, CodecError> {
        let pan_direction = match pan.signum() {
            -1 => PanDirection::Left,
            1 => PanDirection::Right,
            _ => PanDirection::Stop,
        };
        let tilt_direction = match tilt.signum() {
            -1 => TiltDirection::Down,
            1 => TiltDirection::Up,
            _ => TiltDirection::Stop,
        };
        Self::new(
            pan.unsigned_abs().max(1),
            tilt.unsigned_abs().max(1),
            pan_direction,
            tilt_direction,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FocusModeSetting {
    Auto = 0x02,
    Manual = 0x03,
    Toggle = 0x10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationCommand {
    Power { on: bool },
    Home,
    Preset(PresetCommand),
    PanTilt(PanTiltDrive),
    Zoom { direction: DriveDirection, speed: u8 },
    ZoomDirect { position: u16 },
    Focus { direction: DriveDirection, speed: u8 },
    FocusMode(FocusModeSetting),
}

impl ActuationCommand {
    pub const MAX_ZOOM_POSITION: u16 = 0x4000;

    pub fn zoom(direction: DriveDirection, speed: u8) -> Result<Self, CodecError> {
        check_range("zoom speed", u32::from(speed), 0, u32::from(DriveDirection::MAX_SPEED))?;
        Ok(Self::Zoom { direction, speed })
    }

    pub fn focus(direction: DriveDirection, speed: u8) -> Result<Self, CodecError> {
        check_range("focus speed", u32::from(speed), 0, u32::from(DriveDirection::MAX_SPEED))?;
        Ok(Self::Focus { direction, speed })
    }

    pub fn zoom_direct(position: u16) -> Result<Self, CodecError> {
        check_range(
            "zoom position",
            u32::from(position),
            0,
            u32::from(Self::MAX_ZOOM_POSITION),
        )?;
        Ok(Self::ZoomDirect { position })
    }

    fn write_body(&self, packet: &mut Vec<u8>) {
        match self {
            Self::Power { on } => {
                packet.extend_from_slice(&[0x01, 0x04, 0x00, if *on { 0x02 } else { 0x03 }])
            }
            Self::Home => packet.extend_from_slice(&[0x01, 0x06, 0x04]),
            Self::Preset(preset) => packet.extend_from_slice(&[
                0x01,
                0x04,
                0x3F,
                preset.operation,
                preset.memory,
            ]),
            Self::PanTilt(drive) => packet.extend_from_slice(&[
                0x01,
                0x06,
                0x01,
                drive.pan_speed,
                drive.tilt_speed,
                drive.pan as u8,
                drive.tilt as u8,
            ]),
            Self::Zoom { direction, speed } => {
                packet.extend_from_slice(&[0x01, 0x04, 0x07, direction.pack(*speed)])
            }
            Self::ZoomDirect { position } => {
                packet.extend_from_slice(&[0x01, 0x04, 0x47]);
                packet.extend_from_slice(&to_nibbles(*position));
            }
            Self::Focus { direction, speed } => {
                packet.extend_from_slice(&[0x01, 0x04, 0x08, direction.pack(*speed)])
            }
            Self::FocusMode(mode) => packet.extend_from_slice(&[0x01, 0x04, 0x38, *mode as u8]),
        }
    }
}
