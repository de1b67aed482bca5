//! RS200 protocol engine
//!
//! [`RainGauge`] owns the receive framer, the supervision state and the
//! throttle bookkeeping. It never blocks: bytes, poll ticks and timer firings
//! are pushed in by the caller, and outgoing frames are handed to a
//! [`FrameWriter`] without waiting for acknowledgement.

use crate::config::{GaugeConfig, LineSettings};
use crate::error::GaugeError;
use crate::sink::Sinks;
use crate::supervisor::{LinkState, Supervisor, TickOutcome, REBOOT_TIMER};
use crate::timer::{TimerHandle, Timers};
use rs200_protocol::frame;
use rs200_protocol::{
    FirmwareVersion, Frame, FrameAccumulator, FrameWriter, FunctionIndex, ProtocolError, RawFrame,
};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Rainfall status payload to published value
pub const RAIN_SCALE: f64 = 33.33;

/// Snapshot of the engine for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GaugeStatus {
    pub state: LinkState,
    pub firmware: Option<String>,
    pub failed_probes: u16,
}

/// Protocol engine for one RS200 module
pub struct RainGauge<W, T> {
    writer: W,
    timers: T,
    framer: FrameAccumulator,
    supervisor: Supervisor,
    sinks: Sinks,
    throttle: Duration,
    last_realtime_rain: Option<Instant>,
    reboot_interval: Duration,
    poll_interval: Duration,
    line: LineSettings,
    firmware: Option<FirmwareVersion>,
}

impl<W: FrameWriter, T: Timers> RainGauge<W, T> {
    pub fn new(config: &GaugeConfig, writer: W, timers: T, sinks: Sinks) -> Self {
        Self {
            writer,
            timers,
            framer: FrameAccumulator::new(),
            supervisor: Supervisor::new(config.max_failed_probes),
            sinks,
            throttle: config.throttle(),
            last_realtime_rain: None,
            reboot_interval: config.reboot_interval(),
            poll_interval: config.poll_interval(),
            line: config.line.clone(),
            firmware: None,
        }
    }

    /// Probe for the firmware version and arm the reboot timer
    pub fn setup(&mut self) {
        tracing::info!("Setting up RS200");
        self.request_version();
        let handle = self.timers.set_interval(REBOOT_TIMER, self.reboot_interval);
        self.supervisor.arm(handle);
    }

    /// Consume every byte of `data`, dispatching each complete frame in order.
    ///
    /// Returns the number of valid frames dispatched. Invalid frames are
    /// logged and dropped.
    #[allow(clippy::missing_errors_doc)]
    pub fn feed(&mut self, data: &[u8], now: Instant) -> Result<usize, GaugeError> {
        if self.supervisor.is_failed() {
            return Err(GaugeError::DeviceFailed {
                attempts: self.supervisor.failed_probes(),
            });
        }

        let mut dispatched = 0;
        for &byte in data {
            let Some(raw) = self.framer.push(byte) else {
                continue;
            };
            if self.process_frame(&raw, now) {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    /// Scheduler entry point: request the rainfall status once connected
    pub fn poll(&mut self) {
        if self.supervisor.is_connected() {
            self.request(FunctionIndex::RainfallStatus as u8);
        }
    }

    /// Timer entry point. Firings of anything but the live reboot timer are ignored.
    pub fn on_timer(&mut self, handle: &TimerHandle) {
        if !self.supervisor.owns(handle) {
            tracing::trace!("Ignoring stale timer {} ({})", handle.name(), handle.id());
            return;
        }

        match self.supervisor.on_tick() {
            TickOutcome::Retry { .. } => self.request_version(),
            TickOutcome::GiveUp { attempts } => {
                self.request_version();
                tracing::error!("{}", GaugeError::DeviceFailed { attempts });
                self.sinks.publish_rain(f64::NAN);
                self.cancel_reboot_timer();
            }
            TickOutcome::Ignored => {}
        }
    }

    /// Request a value (write bit clear, payload 0)
    pub fn request(&mut self, function_index: u8) {
        self.send(Frame::request(function_index).serialize());
    }

    /// Write a value to the device
    pub fn set(&mut self, function_index: u8, payload: u16) {
        self.send(Frame::set(function_index, payload).serialize());
    }

    /// Ask for the firmware version. A response after connection only
    /// refreshes the stored version.
    pub fn request_version(&mut self) {
        self.request(FunctionIndex::FirmwareVersion as u8);
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        tracing::info!("rs200:");
        for sink in &self.sinks.rain {
            tracing::info!("  Rainfall status: {}", sink.name());
        }
        for sink in &self.sinks.realtime_rain {
            tracing::info!("  Realtime rain: {} (throttle {:?})", sink.name(), self.throttle);
        }
        tracing::info!(
            "  Poll interval: {:?}, reboot interval: {:?}",
            self.poll_interval,
            self.reboot_interval
        );
        tracing::info!(
            "  UART: {} baud, {} data bits, {} stop bits, parity {:?}",
            self.line.baud_rate,
            self.line.data_bits,
            self.line.stop_bits,
            self.line.parity
        );
        for mismatch in self.line.mismatches() {
            tracing::warn!("UART setting mismatch: {}", mismatch);
        }
        if self.supervisor.is_failed() {
            tracing::error!("Connection with RS200 failed!");
        }
    }

    #[must_use]
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        self.supervisor.state()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.supervisor.is_failed()
    }

    #[must_use]
    pub fn failed_probes(&self) -> u16 {
        self.supervisor.failed_probes()
    }

    #[must_use]
    pub fn status(&self) -> GaugeStatus {
        GaugeStatus {
            state: self.state(),
            firmware: self.firmware.map(|v| v.to_string()),
            failed_probes: self.failed_probes(),
        }
    }

    #[must_use]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[must_use]
    pub fn timers(&self) -> &T {
        &self.timers
    }

    /// Decode and dispatch one candidate frame. Returns whether it was valid.
    fn process_frame(&mut self, raw: &RawFrame, now: Instant) -> bool {
        let frame = match frame::decode(raw) {
            Ok(frame) => frame,
            Err(ProtocolError::CrcMismatch { expected, actual }) => {
                tracing::error!(
                    "CRC mismatch, discarding frame: read {:02X}, expected {:02X}",
                    actual,
                    expected
                );
                return false;
            }
            Err(e) => {
                tracing::debug!("Discarding frame {:02X?}: {}", raw, e);
                return false;
            }
        };

        if let Err(e) = self.dispatch(frame.function_index, frame.payload, now) {
            tracing::debug!("{}", e);
        }
        true
    }

    fn dispatch(&mut self, index: u8, payload: u16, now: Instant) -> Result<(), GaugeError> {
        match FunctionIndex::from_u8(index) {
            Some(FunctionIndex::FirmwareVersion) => self.on_firmware_version(payload),
            Some(FunctionIndex::RainfallStatus) => {
                tracing::debug!("rainfall status: {}", payload);
                self.sinks
                    .publish_rain((f64::from(payload) * RAIN_SCALE).round());
            }
            Some(FunctionIndex::SensorStatus) => tracing::debug!("sensor status: {}", payload),
            Some(FunctionIndex::OpticsStatus) => tracing::debug!("optics status: {}", payload),
            Some(FunctionIndex::RealtimeRain) => self.on_realtime_rain(payload, now),
            // Write-only index, responses are not decoded
            Some(FunctionIndex::ReportingCadence) | None => {
                return Err(GaugeError::UnknownFunctionIndex(index));
            }
        }
        Ok(())
    }

    fn on_firmware_version(&mut self, payload: u16) {
        let version = FirmwareVersion::from_payload(payload);
        tracing::debug!("firmware version: {}", version);
        self.firmware = Some(version);
        self.cancel_reboot_timer();

        if self.supervisor.on_handshake() {
            tracing::info!("RS200 connected, firmware {}", version);
            self.send_settings();
        }
    }

    fn on_realtime_rain(&mut self, payload: u16, now: Instant) {
        if let Some(last) = self.last_realtime_rain {
            if now.saturating_duration_since(last) < self.throttle {
                tracing::trace!("realtime rain {} throttled", payload);
                return;
            }
        }
        self.last_realtime_rain = Some(now);
        tracing::debug!("realtime rain: {}", payload);
        self.sinks.publish_realtime_rain(f64::from(payload));
    }

    /// One-time configuration after the first successful handshake
    fn send_settings(&mut self) {
        tracing::info!("Configuring RS200");
        self.request(FunctionIndex::SensorStatus as u8);
        // Start calibration
        self.request(FunctionIndex::OpticsStatus as u8);
        self.set(FunctionIndex::OpticsStatus as u8, 0);
        // Rainfall reporting every n x 50ms
        self.set(FunctionIndex::ReportingCadence as u8, 0);
    }

    fn cancel_reboot_timer(&mut self) {
        if let Some(handle) = self.supervisor.take_timer() {
            self.timers.cancel(&handle);
        }
    }

    fn send(&mut self, raw: RawFrame) {
        tracing::trace!("Sending frame {:02X?}", raw);
        if let Err(e) = self.writer.write_frame(&raw) {
            tracing::warn!("Failed to send frame {:02X?}: {}", raw, e);
        }
    }
}
