//! Common types used throughout the protocol

use std::fmt;
use thiserror::Error;

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Bad start marker: {0:#04X}")]
    BadStartMarker(u8),

    #[error("Not a response frame (flags {0:#04X})")]
    NotAResponse(u8),

    #[error("CRC mismatch: expected {expected:02X}, got {actual:02X}")]
    CrcMismatch { expected: u8, actual: u8 },

    #[error("Serial port error: {0}")]
    SerialError(#[from] std::io::Error),

    #[error("Write queue full")]
    WriteQueueFull,

    #[error("Transport not connected")]
    NotConnected,
}

/// Firmware version reported by the version probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    /// High payload byte is the major number, low byte the minor.
    #[must_use]
    pub fn from_payload(payload: u16) -> Self {
        let [major, minor] = payload.to_be_bytes();
        Self { major, minor }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_version_from_payload() {
        let version = FirmwareVersion::from_payload(0x0102);
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 2);
        assert_eq!(version.to_string(), "1.2");
    }

    #[test]
    fn test_firmware_version_zero() {
        assert_eq!(FirmwareVersion::from_payload(0).to_string(), "0.0");
    }
}
