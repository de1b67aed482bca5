//! Event loop that drives a [`RainGauge`] from a live transport

use crate::engine::{GaugeStatus, RainGauge};
use crate::error::GaugeError;
use crate::timer::{TimerFired, Timers};
use bytes::Bytes;
use rs200_protocol::FrameWriter;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Run the gauge until the device fails or the byte stream ends.
///
/// All engine calls happen on this task, in arrival order. A fresh
/// [`GaugeStatus`] is published on `status_tx` whenever it changes.
#[allow(clippy::missing_errors_doc)]
pub async fn run<W: FrameWriter, T: Timers>(
    mut gauge: RainGauge<W, T>,
    mut chunks: mpsc::Receiver<Bytes>,
    mut timer_rx: mpsc::Receiver<TimerFired>,
    poll_interval: Duration,
    status_tx: watch::Sender<GaugeStatus>,
) -> Result<(), GaugeError> {
    gauge.setup();
    publish_status(&gauge, &status_tx);

    let mut poll = tokio::time::interval(poll_interval);
    // Skip the first immediate tick
    poll.tick().await;

    loop {
        tokio::select! {
            chunk = chunks.recv() => {
                let Some(chunk) = chunk else {
                    tracing::warn!("RS200 byte stream ended");
                    return Err(GaugeError::TransportClosed);
                };
                gauge.feed(&chunk, Instant::now())?;
            }
            Some(fired) = timer_rx.recv() => gauge.on_timer(&fired.handle),
            _ = poll.tick() => gauge.poll(),
        }

        publish_status(&gauge, &status_tx);

        if gauge.is_failed() {
            return Err(GaugeError::DeviceFailed {
                attempts: gauge.failed_probes(),
            });
        }
    }
}

fn publish_status<W: FrameWriter, T: Timers>(
    gauge: &RainGauge<W, T>,
    status_tx: &watch::Sender<GaugeStatus>,
) {
    let status = gauge.status();
    status_tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaugeConfig;
    use crate::sink::Sinks;
    use crate::supervisor::LinkState;
    use crate::testing::SharedWriter;
    use crate::timer::IntervalScheduler;
    use rs200_protocol::frame::encode_command;

    fn spawn_gauge(
        writer: SharedWriter,
        poll_interval: Duration,
    ) -> (
        mpsc::Sender<Bytes>,
        watch::Receiver<GaugeStatus>,
        tokio::task::JoinHandle<Result<(), GaugeError>>,
    ) {
        let (scheduler, timer_rx) = IntervalScheduler::new();
        let gauge = RainGauge::new(&GaugeConfig::default(), writer, scheduler, Sinks::default());
        let (status_tx, status_rx) = watch::channel(gauge.status());
        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let task = tokio::spawn(run(gauge, chunk_rx, timer_rx, poll_interval, status_tx));
        (chunk_tx, status_rx, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_fails() {
        let writer = SharedWriter::default();
        let (_chunk_tx, status_rx, task) = spawn_gauge(writer.clone(), Duration::from_secs(60));

        let result = tokio::time::timeout(Duration::from_secs(120), task)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(result, Err(GaugeError::DeviceFailed { attempts: 6 })));
        assert_eq!(writer.frames().len(), 7);
        assert_eq!(status_rx.borrow().state, LinkState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_polls() {
        let writer = SharedWriter::default();
        let (chunk_tx, mut status_rx, task) =
            spawn_gauge(writer.clone(), Duration::from_secs(10));

        chunk_tx
            .send(Bytes::from_static(&[0x3A, 0x01, 0x00, 0x00, 0x0D]))
            .await
            .unwrap();

        tokio::time::timeout(
            Duration::from_secs(1),
            status_rx.wait_for(|s| s.state == LinkState::Connected),
        )
        .await
        .unwrap()
        .unwrap();

        // Past the first poll tick
        tokio::time::sleep(Duration::from_secs(11)).await;

        let frames = writer.frames();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0], encode_command(0, false, 0));
        assert_eq!(frames[5], encode_command(1, false, 0));
        assert_eq!(status_rx.borrow().firmware.as_deref(), Some("0.0"));

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_stops_runner() {
        let (chunk_tx, _status_rx, task) =
            spawn_gauge(SharedWriter::default(), Duration::from_secs(60));
        drop(chunk_tx);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(GaugeError::TransportClosed)));
    }
}
