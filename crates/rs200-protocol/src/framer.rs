//! Start-marker framing for the RS200 byte stream
//!
//! Frames have a fixed length and no escaping, so the start marker doubles as
//! the resynchronization point: seeing it always restarts accumulation.

use crate::frame::{RawFrame, FRAME_LEN, FRAME_START};

/// Accumulates bytes into fixed-length candidate frames
pub struct FrameAccumulator {
    buffer: RawFrame,
    filled: usize,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    /// Create an empty accumulator, seeking the start marker
    pub fn new() -> Self {
        Self {
            buffer: [0; FRAME_LEN],
            filled: 0,
        }
    }

    /// Push one byte, returning a candidate frame once five bytes are held.
    ///
    /// The candidate is not validated; that is the decoder's job.
    pub fn push(&mut self, byte: u8) -> Option<RawFrame> {
        if byte == FRAME_START {
            if self.filled > 0 {
                tracing::trace!("Resync: dropping {} partial bytes", self.filled);
            }
            self.filled = 0;
        } else if self.filled == 0 {
            tracing::trace!("Skipping byte {:#04X} while seeking start", byte);
            return None;
        }

        self.buffer[self.filled] = byte;
        self.filled += 1;

        if self.filled == FRAME_LEN {
            let frame = self.buffer;
            self.clear();
            return Some(frame);
        }
        None
    }

    /// Feed a chunk and collect every candidate frame it completes
    pub fn feed(&mut self, data: &[u8]) -> Vec<RawFrame> {
        data.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    /// Number of bytes held towards the next frame
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Clear the accumulator state
    pub fn clear(&mut self) {
        self.buffer = [0; FRAME_LEN];
        self.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_command;

    #[test]
    fn test_single_frame() {
        let frame = encode_command(1, true, 3);
        let mut framer = FrameAccumulator::new();
        assert_eq!(framer.feed(&frame), vec![frame]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_garbage_prefix() {
        let frame = encode_command(4, true, 200);
        let mut data = vec![0x00, 0xFF, 0x12, 0x09, 0xC8, 0x01, 0x77];
        data.extend_from_slice(&frame);

        let mut framer = FrameAccumulator::new();
        assert_eq!(framer.feed(&data), vec![frame]);
    }

    #[test]
    fn test_resync_mid_frame() {
        let frame = encode_command(0, true, 0x0102);
        let mut data = vec![FRAME_START, 0x09, 0x00];
        data.extend_from_slice(&frame);

        let mut framer = FrameAccumulator::new();
        assert_eq!(framer.feed(&data), vec![frame]);
    }

    #[test]
    fn test_partial() {
        let frame = encode_command(1, true, 3);
        let mut framer = FrameAccumulator::new();

        assert!(framer.feed(&frame[..2]).is_empty());
        assert_eq!(framer.pending(), 2);

        assert_eq!(framer.feed(&frame[2..]), vec![frame]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let first = encode_command(1, true, 3);
        let second = encode_command(4, true, 17);
        let mut data = first.to_vec();
        data.extend_from_slice(&second);

        let mut framer = FrameAccumulator::new();
        assert_eq!(framer.feed(&data), vec![first, second]);
    }

    #[test]
    fn test_corrupt_frame_still_emitted() {
        let mut framer = FrameAccumulator::new();
        let corrupt = [FRAME_START, 0x09, 0x00, 0xC8, 0x00];
        assert_eq!(framer.feed(&corrupt), vec![corrupt]);
        assert_eq!(framer.pending(), 0);
    }
}
