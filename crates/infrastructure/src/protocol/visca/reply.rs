use super::{BROADCAST_HEADER, CodecError, TERMINATOR};

/// Error codes carried in `y0 6z ee FF`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorKind {
    MessageLength,
    Syntax,
    BufferFull,
    Cancelled,
    NoSocket,
    NotExecutable,
    Other(u8),
}

impl ReplyErrorKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::MessageLength,
            0x02 => Self::Syntax,
            0x03 => Self::BufferFull,
            0x04 => Self::Cancelled,
            0x05 => Self::NoSocket,
            0x41 => Self::NotExecutable,
            other => Self::Other(other),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MessageLength => "message length error".into(),
            Self::Syntax => "syntax error".into(),
            Self::BufferFull => "command buffer full".into(),
            Self::Cancelled => "command cancelled".into(),
            Self::NoSocket => "no socket".into(),
            Self::NotExecutable => "command not executable".into(),
            Self::Other(code) => format!("error {:#04x}", code),
        }
    }
}

/// One frame received from a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViscaReply {
    /// Command accepted into `socket`
    Ack { sender: u8, socket: u8 },
    /// Command finished; inquiries carry a payload
    Completion {
        sender: u8,
        socket: u8,
        payload: Vec<u8>,
    },
    Error {
        sender: u8,
        socket: u8,
        kind: ReplyErrorKind,
    },
    /// Broadcast traffic such as address-set echoes
    Network { payload: Vec<u8> },
}

impl ViscaReply {
    pub fn parse(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < 3 || frame[frame.len() - 1] != TERMINATOR {
            return Err(CodecError::Malformed(format!(
                "reply too short or unterminated: {:02X?}",
                frame
            )));
        }
        let body = &frame[..frame.len() - 1];

        if body[0] == BROADCAST_HEADER {
            return Ok(Self::Network {
                payload: body[1..].to_vec(),
            });
        }
        if body[0] & 0x8F != 0x80 || body[0] < 0x90 {
            return Err(CodecError::Malformed(format!(
                "invalid reply header {:#04x}",
                body[0]
            )));
        }
        let sender = (body[0] >> 4) - 8;
        let socket = body[1] & 0x0F;

        match body[1] & 0xF0 {
            0x40 => Ok(Self::Ack { sender, socket }),
            0x50 => Ok(Self::Completion {
                sender,
                socket,
                payload: body[2..].to_vec(),
            }),
            0x60 => {
                let code = body.get(2).copied().ok_or_else(|| {
                    CodecError::Malformed("error reply without code".into())
                })?;
                Ok(Self::Error {
                    sender,
                    socket,
                    kind: ReplyErrorKind::from_byte(code),
                })
            }
            other => Err(CodecError::Malformed(format!(
                "unknown reply type {:#04x}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ack_and_completion() {
        assert_eq!(
            ViscaReply::parse(&[0x90, 0x41, 0xFF]).unwrap(),
            ViscaReply::Ack {
                sender: 1,
                socket: 1
            }
        );
        assert_eq!(
            ViscaReply::parse(&[0x90, 0x51, 0xFF]).unwrap(),
            ViscaReply::Completion {
                sender: 1,
                socket: 1,
                payload: vec![]
            }
        );
        assert_eq!(
            ViscaReply::parse(&[0xA0, 0x50, 0x02, 0xFF]).unwrap(),
            ViscaReply::Completion {
                sender: 2,
                socket: 0,
                payload: vec![0x02]
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ViscaReply::parse(&[0x90, 0x60, 0x02, 0xFF]).unwrap(),
            ViscaReply::Error {
                sender: 1,
                socket: 0,
                kind: ReplyErrorKind::Syntax
            }
        );
        assert_eq!(
            ViscaReply::parse(&[0x90, 0x61, 0x41, 0xFF]).unwrap(),
            ViscaReply::Error {
                sender: 1,
                socket: 1,
                kind: ReplyErrorKind::NotExecutable
            }
        );
        assert_eq!(ReplyErrorKind::from_byte(0x99), ReplyErrorKind::Other(0x99));
    }

    #[test]
    fn test_parse_network_reply() {
        assert_eq!(
            ViscaReply::parse(&[0x88, 0x30, 0x02, 0xFF]).unwrap(),
            ViscaReply::Network {
                payload: vec![0x30, 0x02]
            }
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(ViscaReply::parse(&[0x90, 0xFF]).is_err());
        assert!(ViscaReply::parse(&[0x90, 0x41, 0x00]).is_err());
        assert!(ViscaReply::parse(&[0x81, 0x41, 0xFF]).is_err());
        assert!(ViscaReply::parse(&[0x90, 0x71, 0xFF]).is_err());
    }
}
