//! OSC 1.0 message encoding.

use bytes::{BufMut, BytesMut};
use domain::integration::osc::OscValue;

use super::CodecError;

/// Null-terminate and pad to a multiple of four bytes
fn put_padded_str(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    let padding = 4 - (value.len() % 4);
    buf.put_bytes(0, padding);
}

fn type_tag(value: &OscValue) -> char {
    match value {
        OscValue::Int(_) => 'i',
        OscValue::Float(_) => 'f',
        OscValue::String(_) => 's',
        OscValue::Bool(true) => 'T',
        OscValue::Bool(false) => 'F',
    }
}

/// Encode one message: address, type tag string, arguments
pub fn encode_message(path: &str, values: &[OscValue]) -> Result<Vec<u8>, CodecError> {
    if !path.starts_with('/') {
        return Err(CodecError::Malformed(format!(
            "OSC address must start with '/': {}",
            path
        )));
    }

    let mut buf = BytesMut::with_capacity(64);
    put_padded_str(&mut buf, path);

    let tags: String = std::iter::once(',').chain(values.iter().map(type_tag)).collect();
    put_padded_str(&mut buf, &tags);

    for value in values {
        match value {
            OscValue::Int(v) => buf.put_i32(*v),
            OscValue::Float(v) => buf.put_f32(*v),
            OscValue::String(s) => put_padded_str(&mut buf, s),
            // Booleans live in the type tag only
            OscValue::Bool(_) => {}
        }
    }
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_without_arguments() {
        let packet = encode_message("/go", &[]).unwrap();
        assert_eq!(packet, b"/go\0,\0\0\0".to_vec());
    }

    #[test]
    fn test_encode_int_and_string() {
        let packet = encode_message(
            "/cue",
            &[OscValue::Int(1), OscValue::String("abc".into())],
        )
        .unwrap();
        let mut expected = b"/cue\0\0\0\0,is\0".to_vec();
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(b"abc\0");
        assert_eq!(packet, expected);
        assert_eq!(packet.len() % 4, 0);
    }

    #[test]
    fn test_encode_float_and_bool() {
        let packet =
            encode_message("/f", &[OscValue::Float(0.5), OscValue::Bool(true)]).unwrap();
        let mut expected = b"/f\0\0,fT\0".to_vec();
        expected.extend_from_slice(&0.5f32.to_be_bytes());
        assert_eq!(packet, expected);
    }

    #[test]
    fn test_invalid_address() {
        assert!(encode_message("nope", &[]).is_err());
    }
}
