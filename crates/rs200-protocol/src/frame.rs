//! RS200 frame structure and CRC handling

use crate::types::ProtocolError;

/// Every frame on the wire is exactly this long
pub const FRAME_LEN: usize = 5;

/// First byte of every frame. Reserved: never valid as a payload byte.
pub const FRAME_START: u8 = 0x3A;

/// Bit 0 of the flags byte: set on writes and on device responses
pub const WRITE_BIT: u8 = 0x01;

/// Largest function index that fits in bits 1..7 of the flags byte
pub const MAX_FUNCTION_INDEX: u8 = 0x7F;

const CRC_SEED: u8 = 0xFF;
const CRC_POLYNOMIAL: u16 = 0x0131;

/// A raw frame as it travels over the serial line
pub type RawFrame = [u8; FRAME_LEN];

/// RS200 protocol frame
///
/// Frame format:
/// ```text
/// [Start: 0x3A]
/// [Flags: function index << 1 | write bit]
/// [Payload: 2 bytes BE]
/// [CRC-8 over flags + payload]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub function_index: u8,
    pub write: bool,
    pub payload: u16,
}

impl Frame {
    /// Read-only request for a function index
    #[must_use]
    pub fn request(function_index: u8) -> Self {
        Self {
            function_index,
            write: false,
            payload: 0,
        }
    }

    /// Write request carrying a value
    #[must_use]
    pub fn set(function_index: u8, payload: u16) -> Self {
        Self {
            function_index,
            write: true,
            payload,
        }
    }

    #[must_use]
    pub fn serialize(&self) -> RawFrame {
        encode_command(self.function_index, self.write, self.payload)
    }
}

/// Encode a command frame ready for the wire.
///
/// `function_index` must be at most [`MAX_FUNCTION_INDEX`]; higher bits are dropped.
#[must_use]
pub fn encode_command(function_index: u8, is_write: bool, payload: u16) -> RawFrame {
    let mut flags = (function_index & MAX_FUNCTION_INDEX) << 1;
    if is_write {
        flags |= WRITE_BIT;
    }
    let [high, low] = payload.to_be_bytes();

    [FRAME_START, flags, high, low, checksum(&[flags, high, low])]
}

/// CRC-8 over flags, payload high and payload low.
#[must_use]
pub fn checksum(data: &[u8; 3]) -> u8 {
    let mut crc = CRC_SEED;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                ((u16::from(crc) << 1) ^ CRC_POLYNOMIAL) as u8
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Validate and decode a response frame.
///
/// Only device responses (write bit set) are accepted; echoed requests are rejected.
#[allow(clippy::missing_errors_doc)]
pub fn decode(raw: &RawFrame) -> Result<Frame, ProtocolError> {
    if raw[0] != FRAME_START {
        return Err(ProtocolError::BadStartMarker(raw[0]));
    }

    let flags = raw[1];
    if flags & WRITE_BIT == 0 {
        return Err(ProtocolError::NotAResponse(flags));
    }

    let expected = checksum(&[flags, raw[2], raw[3]]);
    if raw[4] != expected {
        return Err(ProtocolError::CrcMismatch {
            expected,
            actual: raw[4],
        });
    }

    Ok(Frame {
        function_index: flags >> 1,
        write: true,
        payload: u16::from_be_bytes([raw[2], raw[3]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_reference_values() {
        assert_eq!(checksum(&[0x01, 0x00, 0x00]), 0x0D);
        assert_eq!(checksum(&[0x09, 0x00, 0xC8]), 0xA1);
        assert_eq!(checksum(&[0x00, 0x00, 0x00]), 0x4B);
        assert_eq!(checksum(&[0x07, 0x00, 0x00]), 0xA8);
    }

    #[test]
    fn test_crc_deterministic() {
        let data = [0x5A, 0x12, 0xF0];
        assert_eq!(checksum(&data), checksum(&data));
    }

    #[test]
    fn test_encode_request() {
        let frame = Frame::request(0).serialize();
        assert_eq!(frame, [0x3A, 0x00, 0x00, 0x00, 0x4B]);
    }

    #[test]
    fn test_encode_write() {
        let frame = encode_command(4, true, 200);
        assert_eq!(frame, [0x3A, 0x09, 0x00, 0xC8, 0xA1]);
    }

    #[test]
    fn test_decode_version_response() {
        let frame = decode(&[0x3A, 0x01, 0x00, 0x00, 0x0D]).unwrap();
        assert_eq!(frame.function_index, 0);
        assert_eq!(frame.payload, 0);
    }

    #[test]
    fn test_roundtrip_every_index() {
        for idx in 0..=MAX_FUNCTION_INDEX {
            for payload in [0u16, 1, 0x1234, 0xFFFF] {
                let frame = decode(&encode_command(idx, true, payload)).unwrap();
                assert_eq!(frame.function_index, idx);
                assert_eq!(frame.payload, payload);
            }
        }
    }

    #[test]
    fn test_decode_rejects_bad_start() {
        let mut raw = encode_command(1, true, 3);
        raw[0] = 0x3B;
        assert!(matches!(
            decode(&raw),
            Err(ProtocolError::BadStartMarker(0x3B))
        ));
    }

    #[test]
    fn test_decode_rejects_request() {
        let raw = encode_command(4, false, 200);
        assert!(matches!(decode(&raw), Err(ProtocolError::NotAResponse(0x08))));
    }

    #[test]
    fn test_decode_rejects_crc_mismatch() {
        let result = decode(&[0x3A, 0x09, 0x00, 0xC8, 0xA2]);
        assert!(matches!(
            result,
            Err(ProtocolError::CrcMismatch {
                expected: 0xA1,
                actual: 0xA2
            })
        ));
    }
}
