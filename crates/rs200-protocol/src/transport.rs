//! Async serial transport for the RS200 protocol

use crate::frame::RawFrame;
use crate::types::ProtocolError;

use bytes::Bytes;
use serial2::SerialPort;
use std::time::Duration;
use tokio::sync::mpsc;

/// Baud rate required by the RS200
pub const BAUD_RATE: u32 = 115200;
/// Data bits required by the RS200
pub const DATA_BITS: u8 = 8;
/// Stop bits required by the RS200
pub const STOP_BITS: u8 = 1;

/// Outgoing side of the transport, as seen by the protocol engine.
///
/// Writes are fire-and-forget: implementations must not block.
pub trait FrameWriter {
    #[allow(clippy::missing_errors_doc)]
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), ProtocolError>;
}

impl FrameWriter for Vec<RawFrame> {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), ProtocolError> {
        self.push(*frame);
        Ok(())
    }
}

/// Command to send to the writer task
enum WriteCommand {
    Send(RawFrame),
    Shutdown,
}

/// Serial transport for an RS200 module
///
/// Incoming bytes are forwarded unframed; framing belongs to the engine.
pub struct Rs200Transport {
    /// Channel to send frames to the writer task
    write_tx: mpsc::Sender<WriteCommand>,
}

impl Rs200Transport {
    /// Open the serial port and start the reader thread and writer task.
    ///
    /// Returns the transport together with the stream of raw byte chunks read
    /// from the device. The port is configured as 8N1 at `baud_rate`.
    pub async fn connect(
        path: &str,
        baud_rate: u32,
    ) -> Result<(Self, mpsc::Receiver<Bytes>), ProtocolError> {
        tracing::info!("Connecting to RS200 at {} ({} baud)", path, baud_rate);

        let mut port = SerialPort::open(path, baud_rate).map_err(ProtocolError::SerialError)?;

        // Short read timeout so the reader thread notices shutdown
        port.set_read_timeout(Duration::from_millis(100))
            .map_err(ProtocolError::SerialError)?;

        let reader_port = port.try_clone().map_err(ProtocolError::SerialError)?;

        let (write_tx, write_rx) = mpsc::channel(32);
        let (chunk_tx, chunk_rx) = mpsc::channel::<Bytes>(64);

        tokio::spawn(Self::writer_task(port, write_rx));

        std::thread::spawn(move || {
            Self::reader_thread(reader_port, chunk_tx);
        });

        tracing::info!("Connected to RS200");

        Ok((Self { write_tx }, chunk_rx))
    }

    /// Writer task - runs in tokio runtime
    async fn writer_task(port: SerialPort, mut rx: mpsc::Receiver<WriteCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriteCommand::Send(frame) => {
                    tracing::trace!("Writing frame {:02X?}", frame);
                    if let Err(e) = port.write_all(&frame) {
                        tracing::error!("Write error: {}", e);
                    }
                    if let Err(e) = port.flush() {
                        tracing::error!("Flush error: {}", e);
                    }
                }
                WriteCommand::Shutdown => break,
            }
        }
        tracing::debug!("Writer task shutting down");
    }

    /// Reader thread - blocking reads, chunks handed to the async side
    fn reader_thread(port: SerialPort, chunk_tx: mpsc::Sender<Bytes>) {
        tracing::debug!("Reader thread started");
        let mut buffer = [0u8; 256];

        loop {
            match port.read(&mut buffer) {
                Ok(0) => {
                    tracing::warn!("Serial port closed");
                    break;
                }
                Ok(n) => {
                    tracing::trace!("Read {} bytes: {:02X?}", n, &buffer[..n]);
                    if chunk_tx
                        .blocking_send(Bytes::copy_from_slice(&buffer[..n]))
                        .is_err()
                    {
                        tracing::debug!("Chunk channel closed");
                        return;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if chunk_tx.is_closed() {
                        break;
                    }
                }
                Err(ref e) if e.raw_os_error() == Some(libc::EAGAIN) => {
                    continue;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
                Err(e) => {
                    tracing::error!("Serial read error: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("Reader thread shutting down");
    }
}

impl FrameWriter for Rs200Transport {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), ProtocolError> {
        self.write_tx
            .try_send(WriteCommand::Send(*frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ProtocolError::WriteQueueFull,
                mpsc::error::TrySendError::Closed(_) => ProtocolError::NotConnected,
            })
    }
}

impl Drop for Rs200Transport {
    fn drop(&mut self) {
        // Signal shutdown (best effort)
        let _ = self.write_tx.try_send(WriteCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn test_vec_writer_records_frames() {
        let mut writer: Vec<RawFrame> = Vec::new();
        let frame = Frame::request(1).serialize();
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer, vec![frame]);
    }
}
