//! RS200 serial protocol implementation
//!
//! This crate implements the fixed 5-byte frame protocol spoken by the
//! RS200 optical rain gauge over its UART.

pub mod commands;
pub mod frame;
pub mod framer;
pub mod transport;
pub mod types;

pub use commands::FunctionIndex;
pub use frame::{Frame, RawFrame, FRAME_LEN, FRAME_START};
pub use framer::FrameAccumulator;
pub use transport::{FrameWriter, Rs200Transport};
pub use types::*;
