//! Error types for the rain gauge engine

use rs200_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while driving an RS200
#[derive(Error, Debug)]
pub enum GaugeError {
    /// Frame-level failure (bad marker, echoed request, CRC mismatch)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Valid frame carrying a function index the engine does not decode
    #[error("Unknown function index: {0}")]
    UnknownFunctionIndex(u8),

    /// Version probe unanswered, still within the retry limit
    #[error("RS200 failed to connect {attempts} times")]
    HandshakeTimeout { attempts: u16 },

    /// Retry limit exceeded; the component stays failed
    #[error("RS200 can't connect after {attempts} probes, giving up")]
    DeviceFailed { attempts: u16 },

    /// The byte stream from the transport ended
    #[error("Transport closed")]
    TransportClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error (config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
