use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{CodecError, MAX_FRAME_LEN, TERMINATOR};

/// Frames a VISCA byte stream on the `0xFF` terminator.
///
/// Decoded items are whole frames, terminator included.
#[derive(Debug, Clone, Copy)]
pub struct ViscaCodec {
    max_frame_len: usize,
}

impl ViscaCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for ViscaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ViscaCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == TERMINATOR) {
            Some(end) if end < self.max_frame_len => Ok(Some(src.split_to(end + 1).freeze())),
            Some(_) => Err(CodecError::FrameTooLong(self.max_frame_len)),
            None if src.len() >= self.max_frame_len => {
                Err(CodecError::FrameTooLong(self.max_frame_len))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Vec<u8>> for ViscaCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if packet.last() != Some(&TERMINATOR) {
            return Err(CodecError::Malformed("packet is not terminated".into()));
        }
        if packet.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLong(self.max_frame_len));
        }
        dst.reserve(packet.len());
        dst.put_slice(&packet);
        Ok(())
    }
}
