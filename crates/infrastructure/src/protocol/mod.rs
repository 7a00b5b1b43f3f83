//! Wire formats spoken by the device drivers.

pub mod osc;
pub mod visca;

use thiserror::Error;

/// Encoding and framing failures of the wire codecs
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{field} out of range: {value} (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Frame exceeds {0} bytes without terminator")]
    FrameTooLong(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
